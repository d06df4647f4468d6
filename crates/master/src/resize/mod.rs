//! Index resize: request types, request preparation and index creation

mod create_index;
mod orchestrator;
mod request;

pub use create_index::{
    apply_create_index, validate_index_name, CreateIndexService, MetadataCreateIndexService,
};
pub use orchestrator::{prepare_request, prepare_request_with_limit};
pub use request::{
    ActiveShardCount, CreateIndexRequest, CreateIndexResponse, CreateIndexUpdateRequest,
    ResizeRequest, ResizeResponse, DEFAULT_TIMEOUT_MS,
};
