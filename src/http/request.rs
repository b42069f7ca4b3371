//! Inbound request entity.
//!
//! # Responsibilities
//! - Carry a unique request ID (UUID v4) for log correlation
//! - Expose routing-relevant fields (host, decoded path, dispatcher type)
//! - Hold the scope bindings written back by the mappers
//!
//! # Design Decisions
//! - Requests arrive pre-parsed; the path is already decoded
//! - Bindings are plain fields: one thread owns a request for the whole traversal

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use uuid::Uuid;

use crate::container::Container;

/// Header name conventionally used to propagate the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier attached to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the request reached the current dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatcherType {
    #[default]
    Request,
    Forward,
    Include,
    Error,
    Async,
}

/// A request travelling down the container tree.
#[derive(Clone)]
pub struct Request {
    id: RequestId,
    host: Option<String>,
    decoded_path: String,
    remote_addr: Option<IpAddr>,
    dispatcher: DispatcherType,
    attributes: HashMap<String, String>,

    // Bindings written by the mappers.
    host_binding: Option<Arc<Container>>,
    context: Option<Arc<Container>>,
    wrapper: Option<Arc<Container>>,
    servlet_path: Option<String>,
    path_info: Option<String>,
}

impl Request {
    /// Create a request for the given decoded path.
    pub fn new(decoded_path: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            host: None,
            decoded_path: decoded_path.into(),
            remote_addr: None,
            dispatcher: DispatcherType::Request,
            attributes: HashMap::new(),
            host_binding: None,
            context: None,
            wrapper: None,
            servlet_path: None,
            path_info: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherType) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Virtual host name as sent by the client.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn decoded_path(&self) -> &str {
        &self.decoded_path
    }

    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    pub fn dispatcher(&self) -> DispatcherType {
        self.dispatcher
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    // --- Bindings ---

    /// True once the context-level mapper has bound a wrapper.
    pub fn is_mapped(&self) -> bool {
        self.wrapper.is_some()
    }

    pub fn bound_host(&self) -> Option<&Arc<Container>> {
        self.host_binding.as_ref()
    }

    pub fn context(&self) -> Option<&Arc<Container>> {
        self.context.as_ref()
    }

    pub fn wrapper(&self) -> Option<&Arc<Container>> {
        self.wrapper.as_ref()
    }

    pub fn servlet_path(&self) -> Option<&str> {
        self.servlet_path.as_deref()
    }

    pub fn path_info(&self) -> Option<&str> {
        self.path_info.as_deref()
    }

    /// Path of the bound context, "" for the root context.
    pub fn context_path(&self) -> Option<&str> {
        self.context.as_ref().and_then(|c| c.context_path())
    }

    pub fn set_bound_host(&mut self, host: Option<Arc<Container>>) {
        self.host_binding = host;
    }

    pub fn set_context(&mut self, context: Option<Arc<Container>>) {
        self.context = context;
    }

    pub fn set_wrapper(&mut self, wrapper: Option<Arc<Container>>) {
        self.wrapper = wrapper;
    }

    pub fn set_servlet_path(&mut self, servlet_path: Option<String>) {
        self.servlet_path = servlet_path;
    }

    pub fn set_path_info(&mut self, path_info: Option<String>) {
        self.path_info = path_info;
    }

    /// Drop every scope binding so the request can be mapped again.
    pub fn clear_bindings(&mut self) {
        self.host_binding = None;
        self.context = None;
        self.wrapper = None;
        self.servlet_path = None;
        self.path_info = None;
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("decoded_path", &self.decoded_path)
            .field("dispatcher", &self.dispatcher)
            .field("context", &self.context.as_ref().map(|c| c.name().to_string()))
            .field("wrapper", &self.wrapper.as_ref().map(|c| c.name().to_string()))
            .field("servlet_path", &self.servlet_path)
            .field("path_info", &self.path_info)
            .finish()
    }
}
