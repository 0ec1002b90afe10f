//! DynamoDB store adapter
//!
//! Maps the four [`Store`] operations onto `Query`, `Scan`, `BatchGetItem` and
//! `UpdateItem`. Typed expressions are rendered with [`ExpressionBuilder`];
//! attribute names always go through placeholders so reserved words
//! (`counter`, `ts`) are safe.

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes, ReturnValue};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tideline_core::{
    BatchGetOutput, BatchGetRequest, Cursor, ExpressionBuilder, Item, Page, QueryRequest,
    ReturnValues, ScanRequest, Store, StoreError, StoreResult, UpdateOutcome, UpdateRequest,
};

type AttributeMap = HashMap<String, AttributeValue>;

/// DynamoDB client configuration
#[derive(Debug, Clone, Default)]
pub struct DynamoStoreConfig {
    /// AWS region (SDK default if not specified)
    pub region: Option<String>,
    /// Endpoint override (e.g. LocalStack)
    pub endpoint: Option<String>,
    /// Per-operation timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// [`Store`] backed by Amazon DynamoDB
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
}

impl std::fmt::Debug for DynamoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoStore").finish_non_exhaustive()
    }
}

impl DynamoStore {
    /// Build a client from a shared SDK config plus overrides
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoStoreConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Load the SDK config from the environment, then apply overrides
    pub async fn from_env(config: DynamoStoreConfig) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self::new(&sdk_config, config)
    }

    /// Wrap a pre-built client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn store_error<E, R>(table: &str, operation: &str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some("ProvisionedThroughputExceededException")
        | Some("ThrottlingException")
        | Some("RequestLimitExceeded") => StoreError::Throttled {
            table: table.to_string(),
        },
        Some("ResourceNotFoundException") => StoreError::TableNotFound {
            table: table.to_string(),
        },
        Some("ValidationException") => {
            StoreError::validation(table, err.message().unwrap_or("rejected").to_string())
        }
        _ => StoreError::backend(format!(
            "DynamoDB {} failed: {}",
            operation,
            DisplayErrorContext(&err)
        )),
    }
}

fn is_conditional_check_failed<R>(err: &SdkError<UpdateItemError, R>) -> bool {
    match err {
        SdkError::ServiceError(service_err) => matches!(
            service_err.err(),
            UpdateItemError::ConditionalCheckFailedException(_)
        ),
        _ => false,
    }
}

fn return_value(values: ReturnValues) -> ReturnValue {
    match values {
        ReturnValues::None => ReturnValue::None,
        ReturnValues::AllNew => ReturnValue::AllNew,
        ReturnValues::AllOld => ReturnValue::AllOld,
        ReturnValues::UpdatedNew => ReturnValue::UpdatedNew,
    }
}

fn page_limit(limit: Option<u32>) -> Option<i32> {
    limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
}

fn names_map(names: BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    if names.is_empty() {
        None
    } else {
        Some(names.into_iter().collect())
    }
}

fn values_map(values: BTreeMap<String, Value>) -> Option<AttributeMap> {
    if values.is_empty() {
        None
    } else {
        Some(
            values
                .into_iter()
                .filter_map(|(k, v)| json_to_attr(&v).map(|a| (k, a)))
                .collect(),
        )
    }
}

fn cursor_of(last_evaluated_key: Option<&AttributeMap>) -> Option<Cursor> {
    match last_evaluated_key {
        Some(key) if !key.is_empty() => Some(Cursor::from_key(to_item(key))),
        _ => None,
    }
}

/// Convert a DynamoDB attribute map into an item; binary and set values are skipped
pub fn to_item(map: &AttributeMap) -> Item {
    map.iter()
        .filter_map(|(k, v)| attr_to_json(v).map(|val| (k.clone(), val)))
        .collect()
}

/// Convert an item into a DynamoDB attribute map
pub fn to_attributes(item: &Item) -> AttributeMap {
    item.iter()
        .filter_map(|(k, v)| json_to_attr(v).map(|attr| (k.clone(), attr)))
        .collect()
}

fn attr_to_json(attr: &AttributeValue) -> Option<Value> {
    match attr {
        AttributeValue::S(s) => Some(Value::String(s.clone())),
        AttributeValue::N(n) => {
            if let Ok(i) = n.parse::<i64>() {
                Some(Value::Number(i.into()))
            } else if let Ok(f) = n.parse::<f64>() {
                serde_json::Number::from_f64(f).map(Value::Number)
            } else {
                None
            }
        }
        AttributeValue::Bool(b) => Some(Value::Bool(*b)),
        AttributeValue::Null(_) => Some(Value::Null),
        AttributeValue::L(list) => Some(Value::Array(
            list.iter().filter_map(attr_to_json).collect(),
        )),
        AttributeValue::M(map) => Some(Value::Object(to_item(map))),
        _ => None,
    }
}

fn json_to_attr(value: &Value) -> Option<AttributeValue> {
    match value {
        Value::Null => Some(AttributeValue::Null(true)),
        Value::Bool(b) => Some(AttributeValue::Bool(*b)),
        Value::Number(n) => Some(AttributeValue::N(n.to_string())),
        Value::String(s) => Some(AttributeValue::S(s.clone())),
        Value::Array(arr) => Some(AttributeValue::L(
            arr.iter().filter_map(json_to_attr).collect(),
        )),
        Value::Object(obj) => Some(AttributeValue::M(to_attributes(obj))),
    }
}

#[async_trait]
impl Store for DynamoStore {
    async fn query(&self, request: QueryRequest) -> StoreResult<Page> {
        let mut exprs = ExpressionBuilder::new();
        let key_condition = exprs.key_condition(&request.key_condition);
        let (names, values) = exprs.into_bindings();

        let response = self
            .client
            .query()
            .table_name(&request.table)
            .key_condition_expression(key_condition)
            .set_expression_attribute_names(names_map(names))
            .set_expression_attribute_values(values_map(values))
            .set_limit(page_limit(request.limit))
            .set_exclusive_start_key(request.exclusive_start.map(|c| to_attributes(c.as_key())))
            .send()
            .await
            .map_err(|e| store_error(&request.table, "Query", e))?;

        Ok(Page {
            items: response.items().iter().map(to_item).collect(),
            cursor: cursor_of(response.last_evaluated_key()),
        })
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<Page> {
        let response = self
            .client
            .scan()
            .table_name(&request.table)
            .set_limit(page_limit(request.limit))
            .set_exclusive_start_key(request.exclusive_start.map(|c| to_attributes(c.as_key())))
            .send()
            .await
            .map_err(|e| store_error(&request.table, "Scan", e))?;

        Ok(Page {
            items: response.items().iter().map(to_item).collect(),
            cursor: cursor_of(response.last_evaluated_key()),
        })
    }

    async fn batch_get(&self, request: BatchGetRequest) -> StoreResult<BatchGetOutput> {
        if request.keys.is_empty() {
            return Ok(BatchGetOutput::default());
        }
        let table = request.table.as_str();

        let mut exprs = ExpressionBuilder::new();
        let projection = if request.projection.is_empty() {
            None
        } else {
            Some(exprs.projection(&request.projection))
        };
        let (names, _) = exprs.into_bindings();

        let keys_and_attributes = KeysAndAttributes::builder()
            .set_keys(Some(request.keys.iter().map(to_attributes).collect()))
            .set_projection_expression(projection)
            .set_expression_attribute_names(names_map(names))
            .build()
            .map_err(|e| StoreError::validation(table, e.to_string()))?;

        let response = self
            .client
            .batch_get_item()
            .request_items(table, keys_and_attributes)
            .send()
            .await
            .map_err(|e| store_error(table, "BatchGetItem", e))?;

        let items = response
            .responses()
            .and_then(|r| r.get(table))
            .map(|items| items.iter().map(to_item).collect())
            .unwrap_or_default();
        let unprocessed_keys = response
            .unprocessed_keys()
            .and_then(|u| u.get(table))
            .map(|ka| ka.keys().iter().map(to_item).collect())
            .unwrap_or_default();

        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    async fn conditional_update(&self, request: UpdateRequest) -> StoreResult<UpdateOutcome> {
        let table = request.table.as_str();
        let mut exprs = ExpressionBuilder::new();
        let update = exprs.update(&request.update);
        let condition = request.condition.as_ref().map(|c| exprs.condition(c));
        let (names, values) = exprs.into_bindings();

        let result = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(to_attributes(&request.key)))
            .update_expression(update)
            .set_condition_expression(condition)
            .set_expression_attribute_names(names_map(names))
            .set_expression_attribute_values(values_map(values))
            .return_values(return_value(request.return_values))
            .send()
            .await;

        match result {
            Ok(output) => Ok(UpdateOutcome::Applied {
                attributes: output.attributes().map(to_item),
            }),
            Err(e) if is_conditional_check_failed(&e) => {
                tracing::debug!(target: "tideline::store", table, "condition failed");
                Ok(UpdateOutcome::ConditionFailed)
            }
            Err(e) => Err(store_error(table, "UpdateItem", e)),
        }
    }
}
