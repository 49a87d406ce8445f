//! End-to-end compilation from expression tree to SQL.
//!
//! ```text
//! QueryRoot → classify → bind → translate → build → render → BoundQuery
//!                 ╰─ cached per query ─╯  ╰──── cached per plan key ────╯
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use comprehend::prelude::*;
//! use comprehend::tree::name;
//!
//! let catalog = SchemaCatalog::builder()
//!     .entity("Person", "person", |e| {
//!         e.key("id", ValueType::INT)
//!             .column("name", ValueType::Text)
//!             .column("age", ValueType::INT)
//!     })
//!     .build()?;
//!
//! let query = QueryRoot::select(name("p"))
//!     .iterate("p", name("Person"))
//!     .filter(name("p").attr("age").gt(name("min_age")));
//!
//! let compiler = Compiler::new(Arc::new(catalog));
//! let bound = compiler.compile(&query, &Scope::default().with_local("min_age", 30))?;
//! println!("{} {:?}", bound.sql, bound.params);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, debug_span};

use crate::bind::{self, ParameterTable, QueryId, Scope};
use crate::cache::{compute_hash, PlanCache, PlanKey};
use crate::catalog::Catalog;
use crate::classify::{classify, Classified};
use crate::config::CompilerSettings;
use crate::error::{CompileError, CompileResult};
use crate::functions::{FunctionRegistry, BUILTINS};
use crate::sql::dialect::{Dialect, ParamStyle};
use crate::sql::render::Renderer;
use crate::sql::token::ParamSlot;
use crate::translate::Translator;
use crate::tree::{ExprNode, QueryRoot};
use crate::types::{Value, ValueType};

/// A classified query, independent of dialect and parameter values.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub id: QueryId,
    pub classified: Classified,
}

impl PreparedQuery {
    pub fn root(&self) -> &QueryRoot {
        &self.classified.root
    }

    /// Sub-expressions evaluated in the calling scope, keyed by source text.
    pub fn extracted(&self) -> &BTreeMap<String, ExprNode> {
        &self.classified.extracted
    }
}

/// Rendered SQL with unfilled placeholder slots.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    pub sql: String,
    pub style: ParamStyle,
    pub placeholders: Vec<ParamSlot>,
    pub result_type: ValueType,
    pub columns: usize,
}

/// SQL text plus the parameter values to execute it with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundQuery {
    pub sql: String,
    pub style: ParamStyle,
    /// One value per placeholder for positional styles, otherwise one per
    /// parameter number.
    pub params: Vec<Value>,
    pub result_type: ValueType,
    pub columns: usize,
}

impl BoundQuery {
    /// Parameters by name, for named styles.
    pub fn named_params(&self) -> Option<Vec<(String, Value)>> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, value)| self.style.param_name(i + 1).map(|name| (name, value.clone())))
            .collect()
    }
}

/// Compiles queries against one catalog with fixed settings.
///
/// A compiler is `Sync`; share it between threads to share its plan cache.
pub struct Compiler {
    catalog: Arc<dyn Catalog>,
    functions: &'static FunctionRegistry,
    settings: CompilerSettings,
    cache: Option<Arc<PlanCache>>,
}

impl Compiler {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self::with_settings(catalog, CompilerSettings::default())
    }

    pub fn with_settings(catalog: Arc<dyn Catalog>, settings: CompilerSettings) -> Self {
        let cache = settings
            .plan_cache
            .enabled
            .then(|| Arc::new(PlanCache::new(settings.plan_cache.max_entries)));
        Self {
            catalog,
            functions: &*BUILTINS,
            settings,
            cache,
        }
    }

    /// Use a cache shared with other compilers.
    pub fn with_cache(mut self, cache: Arc<PlanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn dialect(&self) -> Dialect {
        self.settings.dialect
    }

    pub fn cache(&self) -> Option<&Arc<PlanCache>> {
        self.cache.as_ref()
    }

    /// Classify `root`, reusing an earlier classification of the same tree.
    pub fn prepare(&self, root: &QueryRoot) -> CompileResult<Arc<PreparedQuery>> {
        let id = query_id(root)?;
        if let Some(prepared) = self.cache.as_ref().and_then(|c| c.prepared(&id)) {
            return Ok(prepared);
        }
        let classified = classify(root, self.functions)?;
        debug!(query = %id, extracted = classified.extracted.len(), "classified query");
        let prepared = PreparedQuery { id, classified };
        Ok(match &self.cache {
            Some(cache) => cache.insert_prepared(prepared),
            None => Arc::new(prepared),
        })
    }

    /// Compile `root` with values from `scope`.
    pub fn compile(&self, root: &QueryRoot, scope: &Scope) -> CompileResult<BoundQuery> {
        let prepared = self.prepare(root)?;
        self.execute(&prepared, scope)
    }

    /// Bind a prepared query and produce its SQL.
    pub fn execute(&self, prepared: &PreparedQuery, scope: &Scope) -> CompileResult<BoundQuery> {
        let span = debug_span!("compile", query = %prepared.id);
        let _enter = span.enter();

        let params = bind::bind(
            &prepared.id,
            prepared.extracted(),
            scope,
            self.catalog.as_ref(),
        )?;
        let plan = self.plan(prepared, &params)?;
        let values = plan
            .placeholders
            .iter()
            .map(|slot| slot_value(&params, slot))
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(BoundQuery {
            sql: plan.sql.clone(),
            style: plan.style,
            params: values,
            result_type: plan.result_type.clone(),
            columns: plan.columns,
        })
    }

    fn plan(
        &self,
        prepared: &PreparedQuery,
        params: &ParameterTable,
    ) -> CompileResult<Arc<CompiledPlan>> {
        let Some(cache) = &self.cache else {
            return self.translate(prepared, params).map(Arc::new);
        };
        let key = PlanKey {
            query: prepared.id.clone(),
            dialect: self.settings.dialect,
            style: self.settings.effective_paramstyle(),
            inline_constants: self.settings.inline_constants,
            pretty: self.settings.pretty,
            signature: params.signature(),
        };
        if let Some(plan) = cache.plan(&key) {
            return Ok(plan);
        }
        let plan = self.translate(prepared, params)?;
        Ok(cache.insert_plan(key, plan))
    }

    fn translate(
        &self,
        prepared: &PreparedQuery,
        params: &ParameterTable,
    ) -> CompileResult<CompiledPlan> {
        let dialect = self.settings.dialect;
        let translation = Translator::new(self.catalog.as_ref(), params, dialect)
            .with_functions(self.functions)
            .inline_constants(self.settings.inline_constants)
            .translate(prepared.root())?;
        let renderer = Renderer::new(dialect)
            .with_style(self.settings.paramstyle)
            .pretty(self.settings.pretty);
        let rendered = renderer.render(&translation.query);
        debug!(
            dialect = %dialect,
            placeholders = rendered.placeholders.len(),
            "rendered SQL"
        );
        Ok(CompiledPlan {
            sql: rendered.sql,
            style: renderer.style(),
            placeholders: rendered.placeholders,
            result_type: translation.result_type,
            columns: translation.columns,
        })
    }
}

/// Compile once, without keeping a compiler around.
pub fn compile(
    root: &QueryRoot,
    catalog: Arc<dyn Catalog>,
    scope: &Scope,
    dialect: Dialect,
) -> CompileResult<BoundQuery> {
    let settings = CompilerSettings::default()
        .with_dialect(dialect)
        .without_plan_cache();
    Compiler::with_settings(catalog, settings).compile(root, scope)
}

/// Content hash of the query tree.
pub fn query_id(root: &QueryRoot) -> CompileResult<QueryId> {
    compute_hash(root)
        .map(QueryId)
        .map_err(|e| CompileError::Serialization(e.to_string()))
}

fn slot_value(params: &ParameterTable, slot: &ParamSlot) -> CompileResult<Value> {
    params
        .get(&slot.source)
        .and_then(|param| param.flattened().into_iter().nth(slot.index))
        .ok_or_else(|| CompileError::malformed(format!("no bound value for parameter {slot}")))
}
