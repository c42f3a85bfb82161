//! In-memory [`ApiSdk`] for tests.

use std::cell::RefCell;

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::Config;
use crate::encoder::EncodedArguments;
use crate::error::SdkError;
use crate::schema::OperationSchema;
use crate::sdk::region::{ENDPOINTS, RESIDENCIES};
use crate::sdk::{ApiSdk, InvocationResult, ServiceDefinition, Session, SessionOptions};

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub service: String,
    pub operation: String,
    pub arguments: EncodedArguments,
    pub session: Session,
}

pub struct FakeSdk {
    services: IndexMap<String, ServiceDefinition>,
    config: Config,
    status: u16,
    body: String,
    describes: RefCell<Vec<String>>,
    calls: RefCell<Vec<Call>>,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self {
            services: IndexMap::new(),
            config: Config::default(),
            status: 200,
            body: "{}".to_string(),
            describes: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// `operations` is an object of operation name → normalized document.
    pub fn with_service(mut self, name: &str, description: &str, operations: Value) -> Self {
        let operations = operations
            .as_object()
            .map(|ops| ops.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        self.services.insert(
            name.to_string(),
            ServiceDefinition {
                name: name.to_string(),
                description: description.to_string(),
                operations,
            },
        );
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Respond to every call with this status and body. 401/403 and other
    /// non-2xx statuses fail the call the way the HTTP invoker does.
    pub fn respond_with(mut self, status: u16, body: &str) -> Self {
        self.status = status;
        self.body = body.to_string();
        self
    }

    pub fn describe_count(&self, name: &str) -> usize {
        self.describes.borrow().iter().filter(|n| *n == name).count()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl ApiSdk for FakeSdk {
    fn list_services(&self) -> Result<Vec<String>, SdkError> {
        Ok(self.services.keys().cloned().collect())
    }

    fn describe_service(&self, name: &str) -> Result<ServiceDefinition, SdkError> {
        self.describes.borrow_mut().push(name.to_string());
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| SdkError::UnknownService {
                name: name.to_string(),
            })
    }

    fn open_session(&self, options: &SessionOptions) -> Result<Session, SdkError> {
        Ok(Session::resolve(options, &self.config, |_| None)?)
    }

    fn invoke(
        &self,
        session: &Session,
        service: &str,
        operation: &OperationSchema,
        arguments: &EncodedArguments,
    ) -> Result<InvocationResult, SdkError> {
        self.calls.borrow_mut().push(Call {
            service: service.to_string(),
            operation: operation.name.clone(),
            arguments: arguments.clone(),
            session: session.clone(),
        });
        match self.status {
            401 | 403 => Err(SdkError::Authentication {
                status: self.status,
                body: self.body.clone(),
            }),
            200..=299 => Ok(InvocationResult {
                status: self.status,
                body: self.body.clone(),
            }),
            _ => Err(SdkError::Remote {
                status: self.status,
                body: self.body.clone(),
            }),
        }
    }

    fn residencies(&self) -> Vec<String> {
        RESIDENCIES.iter().map(|r| r.to_string()).collect()
    }

    fn endpoints(&self) -> Vec<String> {
        ENDPOINTS.iter().map(|e| e.to_string()).collect()
    }
}
