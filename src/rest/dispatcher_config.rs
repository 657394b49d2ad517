/// How an action name is turned into a handler lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchStyle {
    /// The action names the handler exactly.
    #[default]
    Rest,
    /// The handler is keyed by HTTP method and the lower-cased action, `get_courses` style.
    Router,
}

#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub token: Option<String>,
    pub style: DispatchStyle,
}

impl DispatcherConfig {
    pub fn new() -> Self {
        DispatcherConfig::default()
    }

    /// Requires callers that send an `Authorization` header to present this secret.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn style(mut self, style: DispatchStyle) -> Self {
        self.style = style;
        self
    }
}
