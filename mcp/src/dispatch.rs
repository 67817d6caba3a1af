//! Tool dispatch and argument coercion.
//!
//! Maps a validated (tool, arguments) pair onto exactly one invocation of
//! the ERP collaborator's generic execute entry point, translating wire
//! tool names to the ERP's native method names.

use std::sync::Arc;

use erp_client::{ErpClient, Kwargs, RecordId};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::{
    error::{GatewayError, GatewayResult},
    registry::ToolRegistry,
};

/// Prefix logical operators allowed between domain triples.
const DOMAIN_OPERATORS: [&str; 3] = ["&", "|", "!"];

/// Executes registry tools against the ERP collaborator.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    erp: Arc<dyn ErpClient>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, erp: Arc<dyn ErpClient>) -> Self {
        Self { registry, erp }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Validates arguments against the tool's schema and runs the mapped
    /// ERP operation, returning the success envelope.
    pub async fn call(&self, tool: &str, arguments: &Map<String, Value>) -> GatewayResult<Value> {
        let definition = self
            .registry
            .get(tool)
            .ok_or_else(|| GatewayError::UnknownTool(tool.to_string()))?;

        definition
            .schema
            .validate(&Value::Object(arguments.clone()), "")
            .map_err(|violation| GatewayError::InvalidArguments(violation.to_string()))?;

        info!(tool, "dispatching tool call");

        match tool {
            "search" => self.search(arguments).await,
            "read" => self.read(arguments).await,
            "search_read" => self.search_read(arguments).await,
            "create" => self.create(arguments).await,
            "update" => self.update(arguments).await,
            "delete" => self.delete(arguments).await,
            "get_model_fields" => self.get_model_fields(arguments).await,
            other => Err(GatewayError::UnknownTool(other.to_string())),
        }
    }

    async fn search(&self, args: &Map<String, Value>) -> GatewayResult<Value> {
        let model = str_arg(args, "model");
        let domain = parse_domain(args.get("domain"))?;
        let kwargs = search_kwargs(args);
        flag_unbounded_search("search", model, &domain, args);

        let result = self
            .erp
            .execute(model, "search", vec![Value::Array(domain)], kwargs)
            .await?;
        let ids = id_list(&result)?;

        Ok(json!({
            "success": true,
            "record_ids": ids,
            "count": ids.len(),
            "message": format!("Found {} record(s) in {model}", ids.len()),
        }))
    }

    async fn read(&self, args: &Map<String, Value>) -> GatewayResult<Value> {
        let model = str_arg(args, "model");
        let ids = args.get("ids").cloned().unwrap_or(Value::Array(vec![]));

        let mut kwargs = Kwargs::new();
        if let Some(fields) = args.get("fields") {
            kwargs.insert("fields".into(), fields.clone());
        }

        let result = self.erp.execute(model, "read", vec![ids], kwargs).await?;
        let records = record_list(&result)?;

        Ok(json!({
            "success": true,
            "records": records,
            "count": records.len(),
            "message": format!("Retrieved {} record(s) from {model}", records.len()),
        }))
    }

    async fn search_read(&self, args: &Map<String, Value>) -> GatewayResult<Value> {
        let model = str_arg(args, "model");
        let domain = parse_domain(args.get("domain"))?;
        let mut kwargs = search_kwargs(args);
        if let Some(fields) = args.get("fields") {
            kwargs.insert("fields".into(), fields.clone());
        }
        flag_unbounded_search("search_read", model, &domain, args);

        let result = self
            .erp
            .execute(model, "search_read", vec![Value::Array(domain)], kwargs)
            .await?;
        let records = record_list(&result)?;

        Ok(json!({
            "success": true,
            "records": records,
            "count": records.len(),
            "message": format!("Found and retrieved {} record(s) from {model}", records.len()),
        }))
    }

    async fn create(&self, args: &Map<String, Value>) -> GatewayResult<Value> {
        let model = str_arg(args, "model");
        let values = args.get("values").cloned().unwrap_or(json!({}));

        let result = self
            .erp
            .execute(model, "create", vec![values], Kwargs::new())
            .await?;
        let record_id = result.as_i64().ok_or_else(|| {
            GatewayError::UpstreamRejected("create returned a non-integer id".into())
        })?;

        Ok(json!({
            "success": true,
            "record_id": record_id,
            "message": format!("Successfully created record in {model} with ID {record_id}"),
        }))
    }

    async fn update(&self, args: &Map<String, Value>) -> GatewayResult<Value> {
        let model = str_arg(args, "model");
        let ids = args.get("ids").cloned().unwrap_or(Value::Array(vec![]));
        let count = ids.as_array().map(Vec::len).unwrap_or(0);
        let values = args.get("values").cloned().unwrap_or(json!({}));

        let result = self
            .erp
            .execute(model, "write", vec![ids, values], Kwargs::new())
            .await?;
        let updated = flag_result("write", &result)?;

        Ok(json!({
            "success": true,
            "updated": updated,
            "count": count,
            "message": format!("Successfully updated {count} record(s) in {model}"),
        }))
    }

    async fn delete(&self, args: &Map<String, Value>) -> GatewayResult<Value> {
        let model = str_arg(args, "model");
        let ids = args.get("ids").cloned().unwrap_or(Value::Array(vec![]));
        let count = ids.as_array().map(Vec::len).unwrap_or(0);

        let result = self
            .erp
            .execute(model, "unlink", vec![ids], Kwargs::new())
            .await?;
        let deleted = flag_result("unlink", &result)?;

        Ok(json!({
            "success": true,
            "deleted": deleted,
            "count": count,
            "message": format!("Successfully deleted {count} record(s) from {model}"),
        }))
    }

    async fn get_model_fields(&self, args: &Map<String, Value>) -> GatewayResult<Value> {
        let model = str_arg(args, "model");

        let mut kwargs = Kwargs::new();
        kwargs.insert(
            "attributes".into(),
            json!(["string", "type", "help", "required", "readonly"]),
        );

        let result = self
            .erp
            .execute(model, "fields_get", vec![], kwargs)
            .await?;
        let fields = result.as_object().ok_or_else(|| {
            GatewayError::UpstreamRejected("fields_get returned a non-object result".into())
        })?;

        Ok(json!({
            "success": true,
            "fields": fields,
            "field_count": fields.len(),
            "message": format!("Retrieved {} field definitions for {model}", fields.len()),
        }))
    }
}

/// Schema validation has already run; required string arguments are present.
fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> &'a str {
    args.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn search_kwargs(args: &Map<String, Value>) -> Kwargs {
    let mut kwargs = Kwargs::new();
    let offset = args.get("offset").and_then(Value::as_u64).unwrap_or(0);
    kwargs.insert("offset".into(), json!(offset));
    if let Some(limit) = args.get("limit") {
        kwargs.insert("limit".into(), limit.clone());
    }
    if let Some(order) = args.get("order") {
        kwargs.insert("order".into(), order.clone());
    }
    kwargs
}

/// An unfiltered search without a finite limit walks the whole table.
/// Surface the hazard; do not silently cap.
fn flag_unbounded_search(tool: &str, model: &str, domain: &[Value], args: &Map<String, Value>) {
    if domain.is_empty() && args.get("limit").and_then(Value::as_u64).is_none() {
        warn!(
            tool,
            model, "match-all domain with no limit: unbounded search over every record"
        );
    }
}

/// Normalizes the raw domain argument into filter terms.
///
/// Accepts an absent or empty domain (match every record), prefix logical
/// operators between triples, and [field, operator, value] triples.
fn parse_domain(raw: Option<&Value>) -> GatewayResult<Vec<Value>> {
    let terms = match raw {
        None | Some(Value::Null) => return Ok(vec![]),
        Some(Value::Array(terms)) => terms,
        Some(_) => {
            return Err(GatewayError::InvalidArguments(
                "'domain' must be an array of filter terms".into(),
            ))
        }
    };

    for (index, term) in terms.iter().enumerate() {
        match term {
            Value::String(op) => {
                if !DOMAIN_OPERATORS.contains(&op.as_str()) {
                    return Err(GatewayError::InvalidArguments(format!(
                        "'domain[{index}]' is not a logical operator (expected one of &, |, !)"
                    )));
                }
            }
            Value::Array(triple) => {
                if triple.len() != 3 {
                    return Err(GatewayError::InvalidArguments(format!(
                        "'domain[{index}]' must be a [field, operator, value] triple"
                    )));
                }
                if !triple[0].is_string() || !triple[1].is_string() {
                    return Err(GatewayError::InvalidArguments(format!(
                        "'domain[{index}]' field and operator must be strings"
                    )));
                }
            }
            _ => {
                return Err(GatewayError::InvalidArguments(format!(
                    "'domain[{index}]' must be a filter triple or a logical operator"
                )))
            }
        }
    }

    Ok(terms.clone())
}

fn id_list(result: &Value) -> GatewayResult<Vec<RecordId>> {
    let items = result.as_array().ok_or_else(|| {
        GatewayError::UpstreamRejected("search returned a non-list result".into())
    })?;
    items
        .iter()
        .map(|item| {
            item.as_i64().ok_or_else(|| {
                GatewayError::UpstreamRejected("search returned non-integer ids".into())
            })
        })
        .collect()
}

fn record_list(result: &Value) -> GatewayResult<&Vec<Value>> {
    result.as_array().ok_or_else(|| {
        GatewayError::UpstreamRejected("expected a list of records from the ERP".into())
    })
}

fn flag_result(method: &str, result: &Value) -> GatewayResult<bool> {
    result.as_bool().ok_or_else(|| {
        GatewayError::UpstreamRejected(format!("{method} returned a non-boolean result"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use erp_client::{ErpError, ErpResult};
    use std::sync::Mutex;

    /// Records every execute call and replays canned results.
    struct FakeErp {
        calls: Mutex<Vec<(String, String, Vec<Value>, Kwargs)>>,
        result: Box<dyn Fn(&str) -> ErpResult<Value> + Send + Sync>,
    }

    impl FakeErp {
        fn returning(result: Value) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                result: Box::new(move |_| Ok(result.clone())),
            }
        }

        fn failing(error: fn() -> ErpError) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                result: Box::new(move |_| Err(error())),
            }
        }
    }

    #[async_trait]
    impl ErpClient for FakeErp {
        async fn authenticate(&self) -> ErpResult<i64> {
            Ok(2)
        }

        async fn execute(
            &self,
            model: &str,
            method: &str,
            args: Vec<Value>,
            kwargs: Kwargs,
        ) -> ErpResult<Value> {
            self.calls.lock().unwrap().push((
                model.to_string(),
                method.to_string(),
                args,
                kwargs,
            ));
            (self.result)(method)
        }
    }

    fn dispatcher(erp: FakeErp) -> (Dispatcher, Arc<FakeErp>) {
        let registry = Arc::new(ToolRegistry::builtin().unwrap());
        let erp = Arc::new(erp);
        (Dispatcher::new(registry, erp.clone()), erp)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_search_maps_to_native_method() {
        let (dispatcher, erp) = dispatcher(FakeErp::returning(json!([1, 2, 3])));

        let envelope = dispatcher
            .call(
                "search",
                &args(json!({
                    "model": "res.partner",
                    "domain": [["customer_rank", ">", 0]],
                    "limit": 10
                })),
            )
            .await
            .unwrap();

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["record_ids"], json!([1, 2, 3]));
        assert_eq!(envelope["count"], 3);

        let calls = erp.calls.lock().unwrap();
        let (model, method, call_args, kwargs) = &calls[0];
        assert_eq!(model, "res.partner");
        assert_eq!(method, "search");
        assert_eq!(call_args[0], json!([["customer_rank", ">", 0]]));
        assert_eq!(kwargs.get("limit"), Some(&json!(10)));
        assert_eq!(kwargs.get("offset"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_update_translates_to_write() {
        let (dispatcher, erp) = dispatcher(FakeErp::returning(json!(true)));

        let envelope = dispatcher
            .call(
                "update",
                &args(json!({
                    "model": "res.partner",
                    "ids": [42],
                    "values": {"email": "new@example.com"}
                })),
            )
            .await
            .unwrap();

        assert_eq!(envelope["updated"], true);
        assert_eq!(envelope["count"], 1);
        assert_eq!(erp.calls.lock().unwrap()[0].1, "write");
    }

    #[tokio::test]
    async fn test_delete_translates_to_unlink() {
        let (dispatcher, erp) = dispatcher(FakeErp::returning(json!(true)));

        dispatcher
            .call(
                "delete",
                &args(json!({"model": "sale.order", "ids": [10, 11]})),
            )
            .await
            .unwrap();

        assert_eq!(erp.calls.lock().unwrap()[0].1, "unlink");
    }

    #[tokio::test]
    async fn test_get_model_fields_translates_to_fields_get() {
        let (dispatcher, erp) = dispatcher(FakeErp::returning(json!({
            "name": {"string": "Name", "type": "char", "required": true}
        })));

        let envelope = dispatcher
            .call("get_model_fields", &args(json!({"model": "res.partner"})))
            .await
            .unwrap();

        assert_eq!(envelope["field_count"], 1);
        let calls = erp.calls.lock().unwrap();
        assert_eq!(calls[0].1, "fields_get");
        assert!(calls[0].3.contains_key("attributes"));
    }

    #[tokio::test]
    async fn test_string_ids_rejected_not_coerced() {
        let (dispatcher, erp) = dispatcher(FakeErp::returning(json!(true)));

        let err = dispatcher
            .call(
                "update",
                &args(json!({
                    "model": "res.partner",
                    "ids": ["1"],
                    "values": {"name": "x"}
                })),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_request");
        // Never reached the collaborator.
        assert!(erp.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (dispatcher, _) = dispatcher(FakeErp::returning(json!(null)));
        let err = dispatcher
            .call("explode", &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn test_malformed_domain_triple() {
        let (dispatcher, _) = dispatcher(FakeErp::returning(json!([])));
        let err = dispatcher
            .call(
                "search",
                &args(json!({
                    "model": "res.partner",
                    "domain": [["name", "ilike"]]
                })),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert!(err.to_string().contains("triple"));
    }

    #[tokio::test]
    async fn test_empty_domain_matches_all() {
        let (dispatcher, erp) = dispatcher(FakeErp::returning(json!([7])));
        dispatcher
            .call(
                "search",
                &args(json!({"model": "res.partner", "domain": [], "limit": 1})),
            )
            .await
            .unwrap();
        assert_eq!(erp.calls.lock().unwrap()[0].2[0], json!([]));
    }

    #[tokio::test]
    async fn test_upstream_fault_preserved() {
        let (dispatcher, _) = dispatcher(FakeErp::failing(|| {
            ErpError::Validation("Invalid field 'bogus' on model 'res.partner'".into())
        }));

        let err = dispatcher
            .call(
                "search",
                &args(json!({"model": "res.partner", "domain": [], "limit": 5})),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "upstream_rejected");
        assert!(err.to_string().contains("bogus"));
    }

    #[tokio::test]
    async fn test_transport_fault_is_unavailable() {
        let (dispatcher, _) = dispatcher(FakeErp::failing(|| {
            ErpError::Connection("connection refused".into())
        }));

        let err = dispatcher
            .call(
                "read",
                &args(json!({"model": "res.partner", "ids": [1]})),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "upstream_unavailable");
    }
}
