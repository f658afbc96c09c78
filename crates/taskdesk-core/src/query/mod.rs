//! Query - 検索・並び替えの compile とページング付き一覧取得

pub mod engine;
pub mod filter;

pub use engine::{PageRequest, PaginationInfo, TaskPage, TaskQueryEngine, TaskView};
pub use filter::{
    CompiledQuery, DateField, FieldPredicate, PostJoinFilter, SearchSpec, SortDirection,
    SortField, SortSpec, TaskOrdering, TaskPredicate, TextField, compile, parse_date,
};
