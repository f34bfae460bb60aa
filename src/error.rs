pub type DocforgeResult<T> = Result<T, DocforgeError>;

#[derive(thiserror::Error, Debug)]
pub enum DocforgeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("template load error: {0}")]
    TemplateLoad(String),

    #[error("photo load error: {0}")]
    PhotoLoad(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DocforgeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn template_load(msg: impl Into<String>) -> Self {
        Self::TemplateLoad(msg.into())
    }

    pub fn photo_load(msg: impl Into<String>) -> Self {
        Self::PhotoLoad(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}
