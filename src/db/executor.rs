//! Query execution over a SQLite pool
//!
//! Two modes:
//! - [`QueryExecutor::paginate`] runs the count and page statements in one
//!   transaction so `totalElements` and `content` see the same snapshot
//! - [`QueryExecutor::stream`] forwards records of an unpaged query through
//!   a bounded channel; dropping the stream ends the background task and
//!   returns its connection to the pool

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::sql::SelectRenderer;
use super::sqlite_helpers::decode_row;
use crate::error::{QueryError, Result};
use crate::mapper::{self, RecordAssembler, RowLayout};
use crate::pagination::Page;
use crate::query::{CompiledQuery, Paging};
use crate::record::Record;

/// Lazy, forward-only sequence of mapped records
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// Executes compiled queries and maps their rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a paged query and return one page with its total count
    async fn paginate(&self, query: CompiledQuery, layout: Arc<RowLayout>) -> Result<Page<Record>>;

    /// Stream every record of a query
    fn stream(&self, query: CompiledQuery, layout: Arc<RowLayout>) -> RecordStream;
}

/// [`QueryExecutor`] over a sqlx SQLite pool.
#[derive(Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
    stream_buffer: usize,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool, stream_buffer: usize) -> Self {
        Self {
            pool,
            stream_buffer: stream_buffer.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn paginate(&self, query: CompiledQuery, layout: Arc<RowLayout>) -> Result<Page<Record>> {
        let Paging::Offset { page, size, offset } = query.paging() else {
            return Err(QueryError::InvalidFilterCriteria(
                "unpaged queries must be streamed".to_string(),
            ));
        };

        let count = SelectRenderer::new(&query).count();
        let select = SelectRenderer::new(&query).select(&layout);

        let mut tx = self.pool.begin().await?;

        debug!(sql = %count.sql, "Executing count query");
        let total = count.count_query().fetch_one(&mut *tx).await?;

        debug!(sql = %select.sql, "Executing page query");
        let rows = select.query().fetch_all(&mut *tx).await?;

        tx.commit().await?;

        let decoded = rows
            .iter()
            .map(|row| decode_row(row, &layout))
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
        let content = mapper::map(decoded, layout);

        debug!(
            entity = %query.entity(),
            total,
            returned = content.len(),
            "Page fetched"
        );
        Ok(Page::new(content, total.max(0) as u64, page, size, offset))
    }

    fn stream(&self, query: CompiledQuery, layout: Arc<RowLayout>) -> RecordStream {
        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let select = SelectRenderer::new(&query).select(&layout);
            debug!(sql = %select.sql, "Executing stream query");

            let mut conn = match pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };

            let mut rows = select.query().fetch(&mut *conn);
            let mut assembler = RecordAssembler::new(layout.clone());
            let mut sent = 0usize;

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!(entity = %query.entity(), sent, "Stream consumer dropped");
                        return;
                    }
                    next = rows.next() => next,
                };

                let record = match next {
                    Some(Ok(row)) => match decode_row(&row, &layout) {
                        Ok(values) => assembler.push(values),
                        Err(e) => {
                            if tx.send(Err(e.into())).await.is_err() {
                                warn!("Stream consumer gone before a decode error was delivered");
                            }
                            return;
                        }
                    },
                    Some(Err(e)) => {
                        if tx.send(Err(e.into())).await.is_err() {
                            warn!("Stream consumer gone before a database error was delivered");
                        }
                        return;
                    }
                    None => break,
                };

                if let Some(record) = record {
                    if tx.send(Ok(record)).await.is_err() {
                        return;
                    }
                    sent += 1;
                }
            }

            if let Some(record) = assembler.finish() {
                if tx.send(Ok(record)).await.is_ok() {
                    sent += 1;
                }
            }
            debug!(entity = %query.entity(), sent, "Stream finished");
        });

        ReceiverStream::new(rx).boxed()
    }
}
