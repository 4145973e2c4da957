//! Notify resource - log a message on every run

use anyhow::Result;

use super::{ApplyContext, ApplyResult, BoxedResource, Provider, Resource, ResourceSpec, ResourceState};

/// A message to log; never in sync, so it shows up as a change each run
#[derive(Debug, Clone)]
pub struct Notify {
    pub title: String,
    pub message: String,
}

impl Resource for Notify {
    fn id(&self) -> String {
        self.title.clone()
    }

    fn description(&self) -> String {
        format!("Notify {}", self.message)
    }

    fn resource_type(&self) -> &'static str {
        "notify"
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::Present { details: None })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(format!("message {}", self.message)),
        }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        log::info!("{}", self.message);
        Ok(ApplyResult::Modified)
    }
}

pub struct NotifyProvider;

impl Provider for NotifyProvider {
    fn resource_type(&self) -> &'static str {
        "notify"
    }

    fn instantiate(&self, spec: &ResourceSpec) -> Result<BoxedResource> {
        spec.check_known(&["message", "name"])?;
        Ok(Box::new(Notify {
            title: spec.title.clone(),
            message: spec.string_or_title("message")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::Value;
    use std::collections::BTreeMap;

    #[test]
    fn test_notify_always_drifts() {
        let mut parameters = BTreeMap::new();
        parameters.insert("message".to_string(), Value::from("hello"));
        let notify = NotifyProvider
            .instantiate(&ResourceSpec::new("greeting", parameters))
            .unwrap();

        assert_eq!(notify.id(), "greeting");
        assert!(!notify.in_sync(&notify.current_state().unwrap()));
        assert_eq!(
            notify.apply(&mut ApplyContext::new(false)).unwrap(),
            ApplyResult::Modified
        );
        assert!(!notify.in_sync(&notify.current_state().unwrap()));
    }

    #[test]
    fn test_message_defaults_to_title() {
        let notify = NotifyProvider
            .instantiate(&ResourceSpec::new("just the title", BTreeMap::new()))
            .unwrap();
        assert_eq!(notify.description(), "Notify just the title");
    }

    #[test]
    fn test_unknown_parameter() {
        let mut parameters = BTreeMap::new();
        parameters.insert("volume".to_string(), Value::from("loud"));
        assert!(NotifyProvider
            .instantiate(&ResourceSpec::new("x", parameters))
            .is_err());
    }
}
