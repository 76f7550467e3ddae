use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::config;
use crate::pro_mode::ProMode;
use crate::response;
use crate::tools::pro_mode::ProModeRequest;

#[derive(Clone)]
pub struct ProModeServer {
    pro_mode: Arc<ProMode>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ProModeServer {
    pub fn new(pro_mode: Arc<ProMode>) -> Self {
        Self {
            pro_mode,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "pro_mode",
        description = "Answer a prompt with a local model in pro mode: generate several candidate answers in parallel, then synthesize them into one best answer.",
        annotations(read_only_hint = true)
    )]
    async fn pro_mode(
        &self,
        Parameters(req): Parameters<ProModeRequest>,
    ) -> Result<CallToolResult, McpError> {
        config::validate_prompt(&req.prompt).map_err(|msg| McpError::invalid_params(msg, None))?;

        let params = req.params(self.pro_mode.config().generation_params());
        let outcome = self
            .pro_mode
            .run(&req.prompt, req.num_candidates(), &params)
            .await;
        response::tool_result(outcome)
    }
}

#[tool_handler]
impl ServerHandler for ProModeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "promode".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "promode: best-of-N answers from a local model.\n\n\
                 Call `pro_mode` with a prompt and `num_candidates`. Candidates are generated in \
                 parallel and merged by a second synthesis pass. The JSON payload carries `final`, \
                 the successful `candidates`, any `failed` candidates and timing/usage `stats`."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
