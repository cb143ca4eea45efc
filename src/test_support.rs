//! In-memory sources, sessions, sinks and stores for unit tests

use crate::crawler::{FetchError, LoadedPage, PageSession, SessionFactory};
use crate::output::{DetailRecord, OutputError, OutputResult, OutputSink};
use crate::source::{BudgetSignal, Source};
use crate::state::{CandidateLink, Identifier};
use crate::storage::{DedupBackend, DedupStore, PersistedHistory, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub fn job_url(id: &str) -> String {
    format!("https://fake.example/job/{}.html", id)
}

/// Source serving fixed listing pages and synthetic detail records
pub struct FakeSource {
    pages: Vec<Vec<String>>,
    failing_pages: HashSet<u32>,
    budget: Option<BudgetSignal>,
    detail_failures: Mutex<HashMap<String, (FetchError, usize)>>,
    blank_details: HashSet<String>,
    page_requests: Mutex<Vec<u32>>,
    detail_requests: Mutex<Vec<(String, u64)>>,
}

impl FakeSource {
    pub fn new(pages: Vec<Vec<&str>>) -> Self {
        Self::from_owned(
            pages
                .into_iter()
                .map(|p| p.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }

    pub fn from_owned(pages: Vec<Vec<String>>) -> Self {
        let count = pages.len() as u32;
        Self {
            pages,
            failing_pages: HashSet::new(),
            budget: Some(BudgetSignal::HighestPage(count)),
            detail_failures: Mutex::new(HashMap::new()),
            blank_details: HashSet::new(),
            page_requests: Mutex::new(Vec::new()),
            detail_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failing_pages(mut self, pages: &[u32]) -> Self {
        self.failing_pages.extend(pages.iter().copied());
        self
    }

    pub fn with_budget(mut self, signal: BudgetSignal) -> Self {
        self.budget = Some(signal);
        self
    }

    pub fn with_budget_failure(mut self) -> Self {
        self.budget = None;
        self
    }

    /// Fails the detail fetch of `id` the next `times` attempts
    pub fn with_detail_failure(self, id: &str, error: FetchError, times: usize) -> Self {
        self.detail_failures
            .lock()
            .unwrap()
            .insert(id.to_string(), (error, times));
        self
    }

    pub fn with_blank_detail(mut self, id: &str) -> Self {
        self.blank_details.insert(id.to_string());
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.page_requests.lock().unwrap().clone()
    }

    /// Identifiers of detail fetch attempts, in order
    pub fn detail_attempts(&self) -> Vec<String> {
        self.detail_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Session id used for each detail fetch attempt
    pub fn detail_sessions(&self) -> Vec<u64> {
        self.detail_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, session)| *session)
            .collect()
    }
}

#[async_trait]
impl Source for FakeSource {
    fn name(&self) -> &str {
        "Fake"
    }

    fn dedup_scope(&self) -> &str {
        "Fake"
    }

    fn columns(&self) -> Vec<String> {
        vec!["title".to_string()]
    }

    async fn discover_budget(
        &self,
        _session: &mut dyn PageSession,
    ) -> Result<BudgetSignal, FetchError> {
        self.budget.ok_or_else(|| FetchError::Timeout {
            url: "https://fake.example/".to_string(),
        })
    }

    async fn list_page(
        &self,
        _session: &mut dyn PageSession,
        page: u32,
    ) -> Result<Vec<CandidateLink>, FetchError> {
        self.page_requests.lock().unwrap().push(page);

        if self.failing_pages.contains(&page) {
            return Err(FetchError::Timeout {
                url: format!("https://fake.example/jobs?page={}", page),
            });
        }

        let ids = self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(ids
            .iter()
            .map(|id| CandidateLink::new(id.as_str(), job_url(id), page))
            .collect())
    }

    async fn fetch_detail(
        &self,
        session: &mut dyn PageSession,
        candidate: &CandidateLink,
    ) -> Result<DetailRecord, FetchError> {
        let id = candidate.identifier.to_string();
        self.detail_requests
            .lock()
            .unwrap()
            .push((id.clone(), session.id()));

        {
            let mut failures = self.detail_failures.lock().unwrap();
            if let Some((error, remaining)) = failures.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(error.clone());
                }
            }
        }

        let title = if self.blank_details.contains(&id) {
            String::new()
        } else {
            format!("Title {}", id)
        };

        Ok(
            DetailRecord::new(candidate.identifier.clone(), candidate.url.clone(), "Fake")
                .with_field("title", title),
        )
    }
}

/// Session that never touches the network
pub struct FakeSession {
    id: u64,
}

impl FakeSession {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

#[async_trait]
impl PageSession for FakeSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn load(
        &mut self,
        url: &str,
        _ready_selector: Option<&str>,
    ) -> Result<LoadedPage, FetchError> {
        Ok(LoadedPage {
            final_url: url.to_string(),
            status: 200,
            body: String::new(),
        })
    }
}

/// Counts created sessions; can be told to refuse
#[derive(Default)]
pub struct FakeSessionFactory {
    created: AtomicU64,
    refuse: bool,
}

impl FakeSessionFactory {
    pub fn refusing() -> Self {
        Self {
            created: AtomicU64::new(0),
            refuse: true,
        }
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

impl SessionFactory for FakeSessionFactory {
    fn create(&self) -> Result<Box<dyn PageSession>, FetchError> {
        if self.refuse {
            return Err(FetchError::Session("refused".to_string()));
        }
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakeSession::new(id)))
    }
}

/// Sink keeping records in memory; may reject chosen identifiers
#[derive(Default)]
pub struct FakeSink {
    pub records: Vec<DetailRecord>,
    pub reject: HashSet<String>,
    pub finalized: bool,
    pub fail_finalize: bool,
}

impl FakeSink {
    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            reject: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.identifier.as_str()).collect()
    }
}

impl OutputSink for FakeSink {
    fn append(&mut self, record: &DetailRecord) -> OutputResult<()> {
        if self.reject.contains(record.identifier.as_str()) {
            return Err(OutputError::Write("rejected".to_string()));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn appended(&self) -> usize {
        self.records.len()
    }

    fn finalize(&mut self) -> OutputResult<Option<PathBuf>> {
        self.finalized = true;
        if self.fail_finalize {
            return Err(OutputError::Write("rename refused".to_string()));
        }
        if self.records.is_empty() {
            Ok(None)
        } else {
            Ok(Some(PathBuf::from("fake.csv")))
        }
    }
}

/// Backend holding the history in shared memory
#[derive(Default, Clone)]
pub struct MemoryBackend {
    pub stored: Arc<Mutex<Vec<String>>>,
    pub fail_writes: bool,
}

impl MemoryBackend {
    pub fn with(ids: &[&str]) -> Self {
        let backend = Self::default();
        *backend.stored.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        backend
    }

    /// A backend whose writes always fail
    pub fn read_only(ids: &[&str]) -> Self {
        Self {
            fail_writes: true,
            ..Self::with(ids)
        }
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Io {
                path: PathBuf::from("memory"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        Ok(())
    }
}

impl DedupBackend for MemoryBackend {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn read_all(&self) -> StoreResult<PersistedHistory> {
        Ok(PersistedHistory::complete(self.stored.lock().unwrap().clone()))
    }

    fn write_all(&mut self, identifiers: &[String]) -> StoreResult<()> {
        self.check_writable()?;
        *self.stored.lock().unwrap() = identifiers.to_vec();
        Ok(())
    }

    fn append(&mut self, identifiers: &[String]) -> StoreResult<()> {
        self.check_writable()?;
        self.stored.lock().unwrap().extend_from_slice(identifiers);
        Ok(())
    }
}

pub fn empty_store() -> DedupStore {
    DedupStore::new("Fake", Box::new(MemoryBackend::default()))
}

/// A loaded store already containing `ids`
pub fn store_with(ids: &[String]) -> DedupStore {
    let backend = MemoryBackend::default();
    *backend.stored.lock().unwrap() = ids.to_vec();
    let mut store = DedupStore::new("Fake", Box::new(backend));
    store.load();
    store
}

pub fn id(value: &str) -> Identifier {
    Identifier::from(value)
}
