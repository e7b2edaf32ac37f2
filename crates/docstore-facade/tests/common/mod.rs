//! Common test utilities for docstore-facade integration tests.
//!
//! [`MemoryStore`] is a [`QueryExecutor`] that evaluates the expression
//! subset the facade emits against in-process collections, so facade
//! behaviour can be checked end to end without a server.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use docstore_facade::{Data, Error, Expr, QueryExecutor, Ref, Result, ServerErrors, Value};

type Fields = BTreeMap<String, Value>;

static TRACING: Once = Once::new();

/// Installs a test-writer tracing subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("docstore_facade=debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Builds a payload from a JSON object literal.
pub fn data(value: serde_json::Value) -> Data {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected JSON object, got {other}"),
    }
}

#[derive(Clone)]
struct Stored {
    ts: i64,
    data: Fields,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, BTreeMap<String, Stored>>,
    /// index name -> (collection, field)
    indexes: BTreeMap<String, (String, String)>,
    next_id: u64,
    clock: i64,
}

/// In-memory query evaluator.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failures: Mutex<VecDeque<Error>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an index matching documents of `collection` on `field`.
    pub fn with_index(self, name: &str, collection: &str, field: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .indexes
            .insert(name.to_string(), (collection.to_string(), field.to_string()));
        self
    }

    /// Makes the next query fail with `err` without touching state.
    pub fn fail_next(&self, err: Error) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Number of queries received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of documents stored in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl QueryExecutor for MemoryStore {
    async fn query(&self, expr: &Expr) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.eval(expr, &BTreeMap::new())
    }
}

// -------------------------------------------------------------------------
// Evaluation
// -------------------------------------------------------------------------

fn not_found() -> Error {
    Error::NotFound(ServerErrors::single(
        404,
        "instance not found",
        "Document not found.",
    ))
}

fn already_exists() -> Error {
    Error::BadRequest(ServerErrors::single(
        400,
        "instance already exists",
        "Document already exists.",
    ))
}

fn invalid(description: impl Into<String>) -> Error {
    Error::BadRequest(ServerErrors::single(400, "invalid expression", description))
}

fn as_name(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(invalid(format!("expected string, got {}", other.type_name()))),
    }
}

fn as_id(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(invalid(format!("invalid id type {}", other.type_name()))),
    }
}

fn document_ref(value: Value) -> Result<(String, String)> {
    match value {
        Value::Ref(r) if !r.is_collection() && !r.is_index() => {
            let collection = r
                .collection_name()
                .map(str::to_string)
                .ok_or_else(|| invalid("expected document ref"))?;
            Ok((collection, r.id))
        }
        Value::Ref(_) => Err(invalid("expected document ref")),
        other => Err(invalid(format!("expected ref, got {}", other.type_name()))),
    }
}

fn payload(params: Value) -> Result<Fields> {
    let Value::Object(mut params) = params else {
        return Err(invalid("params must be an object"));
    };
    match params.remove("data") {
        Some(Value::Object(data)) => Ok(data),
        None | Some(Value::Null) => Ok(Fields::new()),
        Some(other) => Err(invalid(format!("data must be an object, got {}", other.type_name()))),
    }
}

fn strip_nulls(fields: Fields) -> Fields {
    fields
        .into_iter()
        .filter(|(_, v)| *v != Value::Null)
        .map(|(k, v)| match v {
            Value::Object(inner) => (k, Value::Object(strip_nulls(inner))),
            other => (k, other),
        })
        .collect()
}

fn merge(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        match value {
            Value::Null => {
                target.remove(&key);
            }
            Value::Object(inner) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge(existing, inner),
                _ => {
                    target.insert(key, Value::Object(strip_nulls(inner)));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}

fn render(collection: &str, id: &str, doc: &Stored) -> Value {
    let mut fields = Fields::new();
    fields.insert("ref".into(), Value::Ref(Ref::document(collection, id)));
    fields.insert("ts".into(), Value::Number(doc.ts.into()));
    fields.insert("data".into(), Value::Object(doc.data.clone()));
    Value::Object(fields)
}

impl State {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn eval(&mut self, expr: &Expr, env: &BTreeMap<String, Value>) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(Value::from(v.clone())),
            Expr::Raw(v) => Value::from_wire(v.clone()),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item, env))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expr::Object(fields) => {
                let mut out = Fields::new();
                for (k, v) in fields {
                    out.insert(k.clone(), self.eval(v, env)?);
                }
                Ok(Value::Object(out))
            }
            Expr::Collection(name) => {
                let name = as_name(self.eval(name, env)?)?;
                Ok(Value::Ref(Ref::collection(name)))
            }
            Expr::Index(name) => {
                let name = as_name(self.eval(name, env)?)?;
                Ok(Value::Ref(Ref::index(name)))
            }
            Expr::Ref { collection, id } => {
                let collection = match self.eval(collection, env)? {
                    Value::Ref(r) if r.is_collection() => r.id,
                    _ => return Err(invalid("Ref expects a collection")),
                };
                let id = as_id(self.eval(id, env)?)?;
                Ok(Value::Ref(Ref::document(collection, id)))
            }
            Expr::Documents(collection) => match self.eval(collection, env)? {
                Value::Ref(r) if r.is_collection() => {
                    Ok(Value::Set(serde_json::json!({ "documents": r.to_json() })))
                }
                _ => Err(invalid("Documents expects a collection")),
            },
            Expr::Match { index, terms } => {
                let index = match self.eval(index, env)? {
                    Value::Ref(r) if r.is_index() => r,
                    _ => return Err(invalid("Match expects an index")),
                };
                let terms = self.eval(terms, env)?;
                Ok(Value::Set(
                    serde_json::json!({ "match": index.to_json(), "terms": terms.to_json() }),
                ))
            }
            Expr::Get(target) => {
                let target = self.eval(target, env)?;
                self.get(target)
            }
            Expr::Paginate { set, size } => {
                let set = self.eval(set, env)?;
                self.paginate(set, size.unwrap_or(64) as usize)
            }
            Expr::Map { collection, lambda } => {
                let Expr::Lambda { param, body } = lambda.as_ref() else {
                    return Err(invalid("Map expects a lambda"));
                };
                match self.eval(collection, env)? {
                    Value::Array(items) => items
                        .into_iter()
                        .map(|item| self.apply(param, body, item, env))
                        .collect::<Result<Vec<_>>>()
                        .map(Value::Array),
                    Value::Object(mut page) => {
                        let items = match page.remove("data") {
                            Some(Value::Array(items)) => items,
                            _ => return Err(invalid("Map expects an array or page")),
                        };
                        let mapped = items
                            .into_iter()
                            .map(|item| self.apply(param, body, item, env))
                            .collect::<Result<Vec<_>>>()?;
                        page.insert("data".into(), Value::Array(mapped));
                        Ok(Value::Object(page))
                    }
                    _ => Err(invalid("Map expects an array or page")),
                }
            }
            Expr::Lambda { .. } => Err(invalid("lambda outside of Map")),
            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| invalid(format!("unbound variable {name}"))),
            Expr::Create { target, params } => {
                let target = self.eval(target, env)?;
                let data = strip_nulls(payload(self.eval(params, env)?)?);
                self.create(target, data)
            }
            Expr::Update { reference, params } => {
                let (collection, id) = document_ref(self.eval(reference, env)?)?;
                let patch = payload(self.eval(params, env)?)?;
                let ts = self.tick();
                let doc = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|c| c.get_mut(&id))
                    .ok_or_else(not_found)?;
                merge(&mut doc.data, patch);
                doc.ts = ts;
                Ok(render(&collection, &id, doc))
            }
            Expr::Replace { reference, params } => {
                let (collection, id) = document_ref(self.eval(reference, env)?)?;
                let data = strip_nulls(payload(self.eval(params, env)?)?);
                let ts = self.tick();
                let doc = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|c| c.get_mut(&id))
                    .ok_or_else(not_found)?;
                doc.data = data;
                doc.ts = ts;
                Ok(render(&collection, &id, doc))
            }
            Expr::Delete(reference) => {
                let (collection, id) = document_ref(self.eval(reference, env)?)?;
                let doc = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|c| c.remove(&id))
                    .ok_or_else(not_found)?;
                Ok(render(&collection, &id, &doc))
            }
            Expr::Time(iso) => Ok(Value::Timestamp(iso.clone())),
            Expr::Date(iso) => Ok(Value::Date(iso.clone())),
            Expr::Bytes(bytes) => Ok(Value::Bytes(bytes.clone())),
        }
    }

    fn apply(
        &mut self,
        param: &str,
        body: &Expr,
        arg: Value,
        env: &BTreeMap<String, Value>,
    ) -> Result<Value> {
        let mut scope = env.clone();
        scope.insert(param.to_string(), arg);
        self.eval(body, &scope)
    }

    fn get(&self, target: Value) -> Result<Value> {
        match target {
            Value::Ref(_) => {
                let (collection, id) = document_ref(target)?;
                let doc = self
                    .collections
                    .get(&collection)
                    .and_then(|c| c.get(&id))
                    .ok_or_else(not_found)?;
                Ok(render(&collection, &id, doc))
            }
            Value::Set(set) => {
                let (collection, id) = self.first_match(&set)?.ok_or_else(not_found)?;
                let doc = &self.collections[&collection][&id];
                Ok(render(&collection, &id, doc))
            }
            other => Err(invalid(format!("cannot Get {}", other.type_name()))),
        }
    }

    fn first_match(&self, set: &serde_json::Value) -> Result<Option<(String, String)>> {
        let index = match set.get("match").cloned().map(Value::from_wire).transpose()? {
            Some(Value::Ref(r)) => r.id,
            _ => return Err(invalid("only Match sets can be read with Get")),
        };
        let (collection, field) = self
            .indexes
            .get(&index)
            .cloned()
            .ok_or_else(|| invalid(format!("index {index} does not exist")))?;
        let terms = match Value::from_wire(set.get("terms").cloned().unwrap_or_default())? {
            Value::Array(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        };
        Ok(self.collections.get(&collection).and_then(|docs| {
            docs.iter()
                .find(|(_, doc)| doc.data.get(&field) == Some(&terms))
                .map(|(id, _)| (collection.clone(), id.clone()))
        }))
    }

    fn paginate(&self, set: Value, size: usize) -> Result<Value> {
        let Value::Set(set) = set else {
            return Err(invalid("Paginate expects a set"));
        };
        let collection = match set.get("documents").cloned().map(Value::from_wire).transpose()? {
            Some(Value::Ref(r)) => r.id,
            _ => return Err(invalid("only Documents sets can be paginated")),
        };
        let refs = self
            .collections
            .get(&collection)
            .into_iter()
            .flat_map(|docs| docs.keys())
            .take(size)
            .map(|id| Value::Ref(Ref::document(collection.clone(), id.clone())))
            .collect();
        let mut page = Fields::new();
        page.insert("data".into(), Value::Array(refs));
        Ok(Value::Object(page))
    }

    fn create(&mut self, target: Value, data: Fields) -> Result<Value> {
        let (collection, id) = match target {
            Value::Ref(r) if r.is_collection() => {
                self.next_id += 1;
                (r.id, format!("{}", 300_000_000_000_000_000 + self.next_id))
            }
            other => document_ref(other)?,
        };
        let ts = self.tick();
        let docs = self.collections.entry(collection.clone()).or_default();
        if docs.contains_key(&id) {
            return Err(already_exists());
        }
        let doc = Stored { ts, data };
        let rendered = render(&collection, &id, &doc);
        docs.insert(id, doc);
        Ok(rendered)
    }
}
