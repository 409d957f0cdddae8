use crate::{EntityService, GrantError, HandlerError, Permission, ServiceFault, WebError};
use serde_json::Value;
use stepkit_config::HandlerConfig;
use stepkit_types::{EntityRecord, ImageSet, InvocationDescriptor};

/// Third-party business logic run in response to a domain event.
///
/// An instance is created once per handler container from the two
/// configuration strings and may serve many invocations; per-invocation
/// state lives in the context, never in the handler.
pub trait Handler: Send + Sync {
    /// Runs the handler body for one invocation.
    fn execute(&self, context: &dyn HandlerContext) -> Result<(), HandlerError>;

    /// Called once after construction, before the first invocation.
    fn initialize(&mut self) {}
}

/// Everything a handler body can see and call during one invocation.
pub trait HandlerContext {
    fn descriptor(&self) -> &InvocationDescriptor;

    /// Configuration decoded for this handler instance, if any was loaded.
    fn config(&self) -> Option<&HandlerConfig>;

    /// The inline target record, when the message carries one.
    fn target(&self) -> Option<&EntityRecord>;

    fn pre_images(&self) -> &ImageSet;

    fn post_images(&self) -> &ImageSet;

    fn input_parameter(&self, name: &str) -> Option<&Value>;

    fn service(&self) -> &dyn EntityService;

    /// Writes one line to the host trace sink. Blank lines are dropped.
    fn trace(&self, message: &str);

    /// Writes the structured cascade for `fault` and its inner faults.
    fn trace_fault(&self, fault: &ServiceFault);

    fn demand(&self, permission: Permission) -> Result<(), GrantError>;

    fn authorize_web_request(&self, url: &str) -> Result<(), GrantError>;

    /// Fetches `url` through the host, which checks the grant first and
    /// again for every redirect. Sandboxed handlers have no other route
    /// to the network.
    fn fetch_url(&self, url: &str) -> Result<Vec<u8>, WebError>;

    /// Resolves a field across the target and the first post/pre images.
    ///
    /// The target wins when it carries the field. The post image is used
    /// when it carries the field or when there is no pre image; otherwise
    /// the pre image answers.
    fn attribute(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.target().and_then(|target| target.get(name)) {
            return Some(value);
        }

        let pre = self.pre_images().first();
        match self.post_images().first() {
            Some(post) if pre.is_none() || post.contains(name) => post.get(name),
            _ => pre.and_then(|pre| pre.get(name)),
        }
    }

    /// Looks `name` up in the post images, then the pre images. Without a
    /// name, the first post image is returned, else the first pre image.
    fn entity_image(&self, name: Option<&str>) -> Option<&EntityRecord> {
        match name.filter(|name| !name.is_empty()) {
            Some(name) => self
                .post_images()
                .get(name)
                .or_else(|| self.pre_images().get(name)),
            None => self.post_images().first().or_else(|| self.pre_images().first()),
        }
    }

    /// Typed read of [`HandlerContext::input_parameter`].
    fn input_parameter_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T>
    where
        Self: Sized,
    {
        self.input_parameter(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Typed read of an input parameter through a `dyn` context.
pub fn input_parameter_as<T: serde::de::DeserializeOwned>(
    context: &dyn HandlerContext,
    name: &str,
) -> Option<T> {
    context
        .input_parameter(name)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}
