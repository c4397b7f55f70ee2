pub mod app_config;
pub mod builder;
pub mod cart;
pub mod config;
pub mod menu;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use builder::{
    compile, line_item_properties, price_cents, strain_display, BuilderError, BuilderSelection,
    CompiledDrink, PumpPricing,
};
pub use cart::{
    AddItem, CartLine, CartSnapshot, LineProperties, LineRef, ValidationError, VariantId,
    MAX_LINE_QUANTITY,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use menu::{load_menu, parse_menu, Menu, SizeOption, StrainPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read menu file {path}: {source}")]
    MenuFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse menu file: {0}")]
    MenuFileParse(#[from] serde_yaml::Error),

    #[error("menu validation failed: {0}")]
    Validation(String),
}
