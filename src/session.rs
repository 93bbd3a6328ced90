//! Navigation hook fired when the session can no longer be recovered

use std::sync::Arc;

/// Where the client sends the user once credentials are gone
pub trait Navigator: Send + Sync + 'static {
    fn redirect_to_login(&self);
}

/// Navigator for headless use; does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to_login(&self) {}
}

/// Navigator backed by a closure
#[derive(Clone)]
pub struct FnNavigator {
    on_login: Arc<dyn Fn() + Send + Sync>,
}

impl FnNavigator {
    pub fn new(on_login: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            on_login: Arc::new(on_login),
        }
    }
}

impl Navigator for FnNavigator {
    fn redirect_to_login(&self) {
        (self.on_login)()
    }
}
