/// Resource class of a candidate request, as reported by the host.
/// Hook registration covers top-level documents and XHR-class
/// sub-resources only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    MainFrame,
    XmlHttpRequest,
    Other,
}

/// A candidate request observed before dispatch.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub url: String,
    pub resource_type: ResourceType,
    pub body: Option<Vec<u8>>,
}

impl RequestInfo {
    pub fn new(url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            resource_type,
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// The hook's verdict on a candidate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Let the request proceed unmodified.
    NoDecision,
    /// Drop the request. Safe for sub-resources only.
    Cancel,
    /// Replace the destination. Used for top-level navigations, where
    /// a cancel would strand the user on a blank page.
    RedirectTo(String),
}
