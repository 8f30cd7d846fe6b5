use crate::model::Id;
use serde::{Deserialize, Serialize};

/// Per-request context threaded explicitly into every transform.
///
/// `user` is the requesting identity when the request is authenticated.
/// `project_id` is the project route segment, when the route has one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user: Option<Id>,
    pub project_id: Option<Id>,
}

impl RequestContext {
    /// Context without an identity, as used by internal callers.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: Id) -> Self {
        Self {
            user: Some(user),
            project_id: None,
        }
    }

    pub fn with_project(mut self, project_id: Id) -> Self {
        self.project_id = Some(project_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builders() {
        let ctx = RequestContext::for_user(4).with_project(12);
        assert_eq!(ctx.user, Some(4));
        assert_eq!(ctx.project_id, Some(12));

        let anon = RequestContext::anonymous();
        assert_eq!(anon.user, None);
        assert_eq!(anon.project_id, None);
    }
}
