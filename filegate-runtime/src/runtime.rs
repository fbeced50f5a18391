//! Invocation loop

use filegate_core::RequestId;
use filegate_handlers::{invoke, GatewayRequest, GatewayResponse, Handler};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::runtime_api::{RuntimeApiClient, RuntimeError};

/// Error type reported when the Runtime API refuses a response
pub const RESPONSE_ERROR_TYPE: &str = "Runtime.ResponseError";

/// Serves one handler against the Runtime API
pub struct Runtime {
    client: RuntimeApiClient,
    handler: Arc<dyn Handler>,
}

impl Runtime {
    pub fn new(client: RuntimeApiClient, handler: Arc<dyn Handler>) -> Self {
        Self { client, handler }
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    /// Fetch one invocation, handle it and post the response
    ///
    /// Handler failures are ordinary gateway responses. A response the
    /// Runtime API refuses is reported on the invocation's error endpoint;
    /// only a failure to report it surfaces as an error here.
    pub async fn process_next(&self) -> Result<GatewayResponse, RuntimeError> {
        let invocation = self.client.next_invocation().await?;
        let request_id = RequestId::with_id(&invocation.request_id);

        debug!(
            request_id = %request_id,
            remaining_ms = ?invocation.remaining_time_ms(),
            "Handling invocation"
        );

        let request = GatewayRequest::from_payload(&invocation.payload);
        let response = invoke(self.handler.as_ref(), &request, &request_id).await;

        if let Err(e) = self
            .client
            .send_response(&invocation.request_id, &response)
            .await
        {
            error!(request_id = %request_id, error = %e, "Failed to send response");
            self.client
                .send_invocation_error(&invocation.request_id, RESPONSE_ERROR_TYPE, &e.to_string())
                .await?;
        }

        Ok(response)
    }

    /// Serve invocations until the Runtime API stops answering
    pub async fn run(&self) -> Result<(), RuntimeError> {
        info!(
            handler = self.handler.name(),
            endpoint = %self.client.base_url(),
            "Runtime started"
        );

        loop {
            self.process_next().await?;
        }
    }
}
