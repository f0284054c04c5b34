use log::{debug, warn};
use planbook_core::allocation::{check_new_session, check_session_update};
use planbook_core::hours::hours_from_json;
use planbook_core::{PlanbookData, PlanbookError, Store};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::requests::*;

const INSTRUCTIONS: &str = "Planbook tracks consulting hour packages. Customers buy engagements \
(packages of hours); delivery plans scope sessions against one engagement, and the planned hours \
of a plan's sessions may never exceed the engagement's package hours.

All tools return JSON. Record IDs look like \"customer-1\", \"engagement-2\", \"plan-3\", \
\"session-4\", \"library-5\", \"topic-6\". Field names in results are camelCase; hour values are \
decimal strings.";

fn json<T: Serialize>(value: T) -> planbook_core::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn text_error(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

// --- Server ---

#[derive(Clone)]
pub struct PlanbookServer {
    store: Store,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PlanbookServer {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            tool_router: Self::tool_router(),
        }
    }

    /// Settings are re-read per call so edits apply without a restart.
    fn default_author(&self) -> Option<String> {
        self.store.read_settings().default_created_by
    }

    fn respond(
        &self,
        tool: &str,
        result: planbook_core::Result<Value>,
    ) -> Result<CallToolResult, McpError> {
        match result {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
                Err(e) => Ok(text_error(format!("Serialization error: {e}"))),
            },
            Err(e) => Ok(self.failure(tool, e)),
        }
    }

    fn failure(&self, tool: &str, err: PlanbookError) -> CallToolResult {
        match &err {
            PlanbookError::Io(_) | PlanbookError::Json(_) => {
                warn!("{tool} failed on {}: {err}", self.store.root().display())
            }
            _ => debug!("{tool} refused: {err}"),
        }
        text_error(err.to_string())
    }

    fn invalid(&self, tool: &str, message: String) -> Result<CallToolResult, McpError> {
        debug!("{tool} refused: {message}");
        Ok(text_error(message))
    }

    fn read<F>(&self, tool: &str, f: F) -> Result<CallToolResult, McpError>
    where
        F: FnOnce(&PlanbookData) -> planbook_core::Result<Value>,
    {
        let result = self.store.read().and_then(|data| f(&data));
        self.respond(tool, result)
    }

    fn write<F>(&self, tool: &str, f: F) -> Result<CallToolResult, McpError>
    where
        F: FnOnce(&mut PlanbookData) -> planbook_core::Result<Value>,
    {
        let result = self.store.update(f);
        self.respond(tool, result)
    }

    // --- Customers ---

    #[tool(description = "List all customers, newest first, each with its engagements")]
    fn list_customers(&self) -> Result<CallToolResult, McpError> {
        self.read("list_customers", |d| json(d.list_customers()))
    }

    #[tool(description = "Get one customer with its engagements")]
    fn get_customer(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.read("get_customer", |d| json(d.get_customer(&req.id)?))
    }

    #[tool(description = "Create a customer. Returns the created record.")]
    fn create_customer(
        &self,
        Parameters(req): Parameters<CreateCustomerRequest>,
    ) -> Result<CallToolResult, McpError> {
        let new = req.into_input(self.default_author());
        self.write("create_customer", |d| json(d.create_customer(new)?))
    }

    // --- Engagements ---

    #[tool(
        description = "List all engagements, newest first, each with its customer and delivery plans"
    )]
    fn list_engagements(&self) -> Result<CallToolResult, McpError> {
        self.read("list_engagements", |d| json(d.list_engagements()))
    }

    #[tool(
        description = "Get one engagement with its customer and every delivery plan including their sessions"
    )]
    fn get_engagement(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.read("get_engagement", |d| json(d.get_engagement(&req.id)?))
    }

    #[tool(
        description = "Create an engagement (a package of hours) for a customer. name, package_hours and customer_id are required."
    )]
    fn create_engagement(
        &self,
        Parameters(req): Parameters<CreateEngagementRequest>,
    ) -> Result<CallToolResult, McpError> {
        let new = match req.into_input(self.default_author()) {
            Ok(new) => new,
            Err(msg) => return self.invalid("create_engagement", msg),
        };
        self.write("create_engagement", |d| json(d.create_engagement(new)?))
    }

    #[tool(
        description = "Update an engagement. Only provided fields change. Lowering package_hours below what plans already hold is allowed; those plans then show negative remaining hours."
    )]
    fn update_engagement(
        &self,
        Parameters(req): Parameters<UpdateEngagementRequest>,
    ) -> Result<CallToolResult, McpError> {
        let (id, patch) = match req.into_patch() {
            Ok(parts) => parts,
            Err(msg) => return self.invalid("update_engagement", msg),
        };
        self.write("update_engagement", |d| json(d.update_engagement(&id, patch)?))
    }

    #[tool(
        description = "Delete an engagement together with its delivery plans and their sessions"
    )]
    fn delete_engagement(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.write("delete_engagement", |d| {
            d.delete_engagement(&req.id)?;
            Ok(json!({ "success": true }))
        })
    }

    // --- Delivery plans ---

    #[tool(
        description = "List all delivery plans, newest first, with engagement, customer, sessions and an hour summary"
    )]
    fn list_delivery_plans(&self) -> Result<CallToolResult, McpError> {
        self.read("list_delivery_plans", |d| json(d.list_delivery_plans()?))
    }

    #[tool(
        description = "Get one delivery plan with its engagement, customer, sessions (with library item and topics) and a summary of package, planned, actual and remaining hours"
    )]
    fn get_delivery_plan(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.read("get_delivery_plan", |d| json(d.get_delivery_plan(&req.id)?))
    }

    #[tool(
        description = "Create a delivery plan against an engagement. title and engagement_id are required."
    )]
    fn create_delivery_plan(
        &self,
        Parameters(req): Parameters<CreateDeliveryPlanRequest>,
    ) -> Result<CallToolResult, McpError> {
        let new = match req.into_input(self.default_author()) {
            Ok(new) => new,
            Err(msg) => return self.invalid("create_delivery_plan", msg),
        };
        self.write("create_delivery_plan", |d| json(d.create_delivery_plan(new)?))
    }

    #[tool(description = "Update a delivery plan's title or status. Its engagement cannot change.")]
    fn update_delivery_plan(
        &self,
        Parameters(req): Parameters<UpdateDeliveryPlanRequest>,
    ) -> Result<CallToolResult, McpError> {
        let (id, patch) = match req.into_patch() {
            Ok(parts) => parts,
            Err(msg) => return self.invalid("update_delivery_plan", msg),
        };
        self.write("update_delivery_plan", |d| {
            json(d.update_delivery_plan(&id, patch)?)
        })
    }

    #[tool(description = "Delete a delivery plan and its sessions")]
    fn delete_delivery_plan(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.write("delete_delivery_plan", |d| {
            d.delete_delivery_plan(&req.id)?;
            Ok(json!({ "success": true }))
        })
    }

    // --- Sessions ---

    #[tool(
        description = "List all sessions, newest first, with plan, engagement, customer, library item and topics"
    )]
    fn list_sessions(&self) -> Result<CallToolResult, McpError> {
        self.read("list_sessions", |d| json(d.list_sessions()))
    }

    #[tool(
        description = "Get one session with its plan, engagement, customer, library item and topics"
    )]
    fn get_session(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.read("get_session", |d| json(d.get_session(&req.id)?))
    }

    #[tool(
        description = "Create a session in a delivery plan. Refused when the plan's planned hours would exceed the engagement's package hours. Give library_item_id to start from a library template."
    )]
    fn create_session(
        &self,
        Parameters(req): Parameters<CreateSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let template = match req.library_item_id.as_deref() {
            Some(item_id) => match self
                .store
                .read()
                .and_then(|d| d.session_from_library_item(item_id, &req.delivery_plan_id))
            {
                Ok(template) => Some(template),
                Err(e) => return Ok(self.failure("create_session", e)),
            },
            None => None,
        };
        let new = match req.into_input(template, self.default_author()) {
            Ok(new) => new,
            Err(msg) => return self.invalid("create_session", msg),
        };
        self.write("create_session", |d| json(d.create_session(new)?))
    }

    #[tool(
        description = "Update a session. Only provided fields change. A new planned_hours is checked against the package, excluding the session's current hours."
    )]
    fn update_session(
        &self,
        Parameters(req): Parameters<UpdateSessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let (id, patch) = match req.into_patch() {
            Ok(parts) => parts,
            Err(msg) => return self.invalid("update_session", msg),
        };
        self.write("update_session", |d| json(d.update_session(&id, patch)?))
    }

    #[tool(description = "Delete a session")]
    fn delete_session(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.write("delete_session", |d| {
            d.delete_session(&req.id)?;
            Ok(json!({ "success": true }))
        })
    }

    #[tool(
        description = "Check whether planned hours fit a delivery plan's package without writing anything. Returns {decision: \"admit\", projectedTotal, remaining} or {decision: \"reject\", projectedTotal, capacity, overage}. Pass session_id when resizing an existing session."
    )]
    fn check_allocation(
        &self,
        Parameters(req): Parameters<CheckAllocationRequest>,
    ) -> Result<CallToolResult, McpError> {
        let hours = match hours_from_json(&req.planned_hours) {
            Ok(h) => h,
            Err(e) => return self.invalid("check_allocation", e.to_string()),
        };
        self.read("check_allocation", |d| {
            let decision = match req.session_id.as_deref() {
                Some(session_id) => {
                    check_session_update(d, &req.delivery_plan_id, session_id, hours)?
                }
                None => check_new_session(d, &req.delivery_plan_id, hours)?,
            };
            json(decision)
        })
    }

    // --- Library ---

    #[tool(description = "List all library items (session templates), newest first")]
    fn list_library_items(&self) -> Result<CallToolResult, McpError> {
        self.read("list_library_items", |d| json(d.list_library_items()))
    }

    #[tool(description = "Get one library item with its topics and the sessions created from it")]
    fn get_library_item(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.read("get_library_item", |d| json(d.get_library_item(&req.id)?))
    }

    #[tool(description = "Create a library item. title and default_hours are required.")]
    fn create_library_item(
        &self,
        Parameters(req): Parameters<CreateLibraryItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let new = match req.into_input(self.default_author()) {
            Ok(new) => new,
            Err(msg) => return self.invalid("create_library_item", msg),
        };
        self.write("create_library_item", |d| json(d.create_library_item(new)?))
    }

    #[tool(
        description = "Update a library item. Sessions already created from it are not changed."
    )]
    fn update_library_item(
        &self,
        Parameters(req): Parameters<UpdateLibraryItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let (id, patch) = match req.into_patch() {
            Ok(parts) => parts,
            Err(msg) => return self.invalid("update_library_item", msg),
        };
        self.write("update_library_item", |d| {
            json(d.update_library_item(&id, patch)?)
        })
    }

    #[tool(description = "Delete a library item. Sessions created from it are kept and unlinked.")]
    fn delete_library_item(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.write("delete_library_item", |d| {
            d.delete_library_item(&req.id)?;
            Ok(json!({ "success": true }))
        })
    }

    // --- Topics ---

    #[tool(description = "List all topics by name")]
    fn list_topics(&self) -> Result<CallToolResult, McpError> {
        self.read("list_topics", |d| json(d.list_topics()))
    }

    #[tool(description = "Get one topic with the library items and sessions tagged with it")]
    fn get_topic(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.read("get_topic", |d| json(d.get_topic(&req.id)?))
    }

    #[tool(description = "Create a topic. name is required.")]
    fn create_topic(
        &self,
        Parameters(req): Parameters<CreateTopicRequest>,
    ) -> Result<CallToolResult, McpError> {
        let new = req.into_input(self.default_author());
        self.write("create_topic", |d| json(d.create_topic(new)?))
    }

    #[tool(description = "Rename or recolor a topic")]
    fn update_topic(
        &self,
        Parameters(req): Parameters<UpdateTopicRequest>,
    ) -> Result<CallToolResult, McpError> {
        let (id, patch) = req.into_patch();
        self.write("update_topic", |d| json(d.update_topic(&id, patch)?))
    }

    #[tool(description = "Delete a topic and untag every session and library item that used it")]
    fn delete_topic(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.write("delete_topic", |d| {
            d.delete_topic(&req.id)?;
            Ok(json!({ "success": true }))
        })
    }

    #[tool(
        description = "Get the Planbook domain rules and the recommended workflow for booking hours"
    )]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            planbook_core::rules::RULES,
        )]))
    }
}

#[tool_handler]
impl ServerHandler for PlanbookServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Rules\n{}",
            INSTRUCTIONS,
            planbook_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
