use skysense_store::Theme;

/// Receives the theme the session settled on. What it does with it (a CSS
/// class, a window style) is up to the UI.
pub trait ThemeSink: Send + Sync {
    fn apply_theme(&self, theme: Theme);
}

/// Sink that ignores theme changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopThemeSink;

impl ThemeSink for NoopThemeSink {
    fn apply_theme(&self, _theme: Theme) {}
}
