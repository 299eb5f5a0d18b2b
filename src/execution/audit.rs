use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::types::{Result, SwapReceipt};

/// Append-only sink for settled swaps.
///
/// Settlement correctness never depends on it beyond idempotency lookups.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, receipt: &SwapReceipt) -> Result<()>;

    async fn find_by_token(&self, idempotency_token: &str) -> Result<Option<SwapReceipt>>;

    /// The receipt that consumed a quote, if any
    async fn find_by_quote(&self, quote_id: &str) -> Result<Option<SwapReceipt>>;

    /// Every receipt in append order
    async fn receipts(&self) -> Result<Vec<SwapReceipt>>;
}

#[derive(Default)]
struct ReceiptIndex {
    ordered: Vec<SwapReceipt>,
    by_token: HashMap<String, usize>,
    by_quote: HashMap<String, usize>,
}

impl ReceiptIndex {
    fn insert(&mut self, receipt: SwapReceipt) {
        let position = self.ordered.len();
        self.by_token.insert(receipt.idempotency_token.clone(), position);
        self.by_quote.insert(receipt.quote_id.clone(), position);
        self.ordered.push(receipt);
    }

    fn find(&self, token: &str) -> Option<SwapReceipt> {
        self.by_token.get(token).map(|&i| self.ordered[i].clone())
    }

    fn find_quote(&self, quote_id: &str) -> Option<SwapReceipt> {
        self.by_quote.get(quote_id).map(|&i| self.ordered[i].clone())
    }
}

#[derive(Default)]
pub struct InMemoryAuditLog {
    index: RwLock<ReceiptIndex>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, receipt: &SwapReceipt) -> Result<()> {
        self.index.write().await.insert(receipt.clone());
        Ok(())
    }

    async fn find_by_token(&self, idempotency_token: &str) -> Result<Option<SwapReceipt>> {
        Ok(self.index.read().await.find(idempotency_token))
    }

    async fn find_by_quote(&self, quote_id: &str) -> Result<Option<SwapReceipt>> {
        Ok(self.index.read().await.find_quote(quote_id))
    }

    async fn receipts(&self) -> Result<Vec<SwapReceipt>> {
        Ok(self.index.read().await.ordered.clone())
    }
}

/// One JSON receipt per line. The index is rebuilt from the file on open,
/// so idempotency tokens survive a restart.
pub struct JsonlAuditLog {
    path: PathBuf,
    index: RwLock<ReceiptIndex>,
}

impl JsonlAuditLog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut index = ReceiptIndex::default();

        if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<SwapReceipt>(line) {
                    Ok(receipt) => index.insert(receipt),
                    Err(e) => warn!("Skipping unreadable audit line {} in {}: {}", line_no + 1, path.display(), e),
                }
            }
        }

        info!("Audit log {} opened with {} receipts", path.display(), index.ordered.len());
        Ok(Self {
            path,
            index: RwLock::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn append(&self, receipt: &SwapReceipt) -> Result<()> {
        let mut line = serde_json::to_string(receipt)?;
        line.push('\n');

        // Held across the write so lines land in index order
        let mut index = self.index.write().await;
        index.insert(receipt.clone());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn find_by_token(&self, idempotency_token: &str) -> Result<Option<SwapReceipt>> {
        Ok(self.index.read().await.find(idempotency_token))
    }

    async fn find_by_quote(&self, quote_id: &str) -> Result<Option<SwapReceipt>> {
        Ok(self.index.read().await.find_quote(quote_id))
    }

    async fn receipts(&self) -> Result<Vec<SwapReceipt>> {
        Ok(self.index.read().await.ordered.clone())
    }
}
