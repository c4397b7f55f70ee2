//! Cart-count badges bound to `cart:update`.

use std::sync::{Arc, Mutex, PoisonError};

use crate::events::{CartEvent, CartListener};

/// A rendered element showing the cart item count.
pub trait CountTarget: Send + Sync {
    fn render(&self, item_count: u32);
}

/// What a `[data-cart-count]` badge would show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeState {
    pub text: String,
    pub data_cart_count: u32,
    /// Empty carts hide the badge.
    pub hidden: bool,
}

/// In-memory badge recording its last rendered state.
#[derive(Debug)]
pub struct CountBadge {
    state: Mutex<BadgeState>,
}

impl Default for CountBadge {
    fn default() -> Self {
        Self {
            state: Mutex::new(BadgeState {
                text: String::new(),
                data_cart_count: 0,
                hidden: true,
            }),
        }
    }
}

impl CountBadge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> BadgeState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CountTarget for CountBadge {
    fn render(&self, item_count: u32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = BadgeState {
            text: if item_count == 0 {
                String::new()
            } else {
                item_count.to_string()
            },
            data_cart_count: item_count,
            hidden: item_count == 0,
        };
    }
}

/// Listener rendering the item count into every bound target.
#[derive(Default)]
pub struct CountBinder {
    targets: Vec<Arc<dyn CountTarget>>,
}

impl std::fmt::Debug for CountBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountBinder")
            .field("targets", &self.targets.len())
            .finish()
    }
}

impl CountBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_target(mut self, target: Arc<dyn CountTarget>) -> Self {
        self.bind(target);
        self
    }

    pub fn bind(&mut self, target: Arc<dyn CountTarget>) {
        self.targets.push(target);
    }

    pub fn render(&self, item_count: u32) {
        for target in &self.targets {
            target.render(item_count);
        }
    }
}

impl CartListener for CountBinder {
    fn on_event(&self, event: &CartEvent) {
        if let CartEvent::Update { cart } = event {
            self.render(cart.item_count());
        }
    }
}
