pub mod connector;
pub mod execution_router;
pub mod llm_client;
pub mod mediator;
pub mod mysql_connector;
pub mod query_compiler;
pub mod relationship_inferencer;
pub mod result_cache;
pub mod tabular_engine;

pub use connector::{ConnectorError, DatabaseConnector, QueryResult};
pub use execution_router::{ExecutionRouter, TtlPolicy};
pub use llm_client::{LanguageModel, LlmAnswer, LlmClient, LlmError};
pub use mediator::{AnalysisMediator, FALLBACK_ANSWER, MediatedAnswer};
pub use mysql_connector::MySqlConnector;
pub use query_compiler::{
    DatasetFields, build_query, derive_dataset_fields, sanitize_identifier,
    translate_chart_config,
};
pub use relationship_inferencer::{generate_join_clauses, infer_relationships};
pub use result_cache::{CacheStats, CacheStore, LocalCacheStore, ResultCache};
