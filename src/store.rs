//! Embedded document store backing the regulation desk.
//!
//! Documents live in four collections (units, beds, requests, discharges).
//! Audit and review histories are kept apart from their parent documents in
//! append-only, time-ordered tables keyed by parent id. All writes go through
//! a [`WriteBatch`] which commits every mutation or none of them.

use crate::errors::{RegulationError, RegulationResult};
use crate::models::{AuditEntry, Bed, DischargeAssessment, Request, ReviewEntry, Unit};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

const AUDIT_LOG: &str = "audit_log";
const REVIEW_LOG: &str = "review_log";

/// One history entry and the document it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord<E> {
    pub parent_id: String,
    pub entry: E,
}

/// Everything the store persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    #[serde(default)]
    units: BTreeMap<String, Unit>,
    #[serde(default)]
    beds: BTreeMap<String, Bed>,
    #[serde(default)]
    requests: BTreeMap<String, Request>,
    #[serde(default)]
    discharges: BTreeMap<String, DischargeAssessment>,
    #[serde(default)]
    audit_log: Vec<HistoryRecord<AuditEntry>>,
    #[serde(default)]
    review_log: Vec<HistoryRecord<ReviewEntry>>,
}

/// Live subscribers, per collection.
#[derive(Default)]
pub struct Feeds {
    units: Vec<Feed<Unit>>,
    beds: Vec<Feed<Bed>>,
    requests: Vec<Feed<Request>>,
    discharges: Vec<Feed<DischargeAssessment>>,
}

/// A document type stored in its own collection.
pub trait Document: Clone + Serialize + DeserializeOwned + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    #[doc(hidden)]
    fn table(data: &StoreData) -> &BTreeMap<String, Self>;
    #[doc(hidden)]
    fn table_mut(data: &mut StoreData) -> &mut BTreeMap<String, Self>;
    #[doc(hidden)]
    fn feeds(feeds: &mut Feeds) -> &mut Vec<Feed<Self>>;
}

macro_rules! document {
    ($ty:ty, $collection:literal, $field:ident) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn table(data: &StoreData) -> &BTreeMap<String, Self> {
                &data.$field
            }

            fn table_mut(data: &mut StoreData) -> &mut BTreeMap<String, Self> {
                &mut data.$field
            }

            fn feeds(feeds: &mut Feeds) -> &mut Vec<Feed<Self>> {
                &mut feeds.$field
            }
        }
    };
}

document!(Unit, "units", units);
document!(Bed, "beds", beds);
document!(Request, "requests", requests);
document!(DischargeAssessment, "discharges", discharges);

type Filter<T> = Box<dyn Fn(&T) -> bool>;
type Order<T> = Box<dyn Fn(&T, &T) -> Ordering>;

#[doc(hidden)]
pub struct Feed<T> {
    filter: Filter<T>,
    order: Order<T>,
    tx: Sender<Vec<T>>,
}

impl<T: Document> Feed<T> {
    fn snapshot(&self, data: &StoreData) -> Vec<T> {
        let mut docs: Vec<T> = T::table(data)
            .values()
            .filter(|doc| (self.filter)(doc))
            .cloned()
            .collect();
        docs.sort_by(|a, b| (self.order)(a, b));
        docs
    }

    /// Push the current result set. Returns `false` once the receiver is gone.
    fn push(&self, data: &StoreData) -> bool {
        self.tx.send(self.snapshot(data)).is_ok()
    }
}

/// Receiving end of a query subscription.
///
/// Every notification carries the complete, ordered result set of the query.
/// Dropping the subscription unsubscribes it.
pub struct Subscription<T> {
    rx: Receiver<Vec<T>>,
}

impl<T> Subscription<T> {
    /// Take the next pending notification, if any.
    pub fn try_next(&self) -> Option<Vec<T>> {
        self.rx.try_recv().ok()
    }

    /// Drain all pending notifications and keep the most recent one.
    pub fn latest(&self) -> Option<Vec<T>> {
        self.rx.try_iter().last()
    }
}

type Mutation = Box<dyn FnOnce(&mut StoreData) -> RegulationResult<()>>;

/// A set of mutations committed atomically.
#[derive(Default)]
pub struct WriteBatch {
    mutations: Vec<(&'static str, Mutation)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Create or overwrite a document. A fresh id is assigned when it has none.
    pub fn set<T: Document>(&mut self, mut doc: T) -> String {
        if doc.id().is_empty() {
            doc.set_id(Uuid::new_v4().to_string());
        }
        let id = doc.id().to_string();
        let key = id.clone();
        self.mutations.push((
            T::COLLECTION,
            Box::new(move |data| {
                T::table_mut(data).insert(key, doc);
                Ok(())
            }),
        ));
        id
    }

    /// Replace an existing document; the commit fails if it is absent.
    pub fn update<T: Document>(&mut self, doc: T) -> &mut Self {
        self.mutations.push((
            T::COLLECTION,
            Box::new(move |data| {
                let slot = T::table_mut(data)
                    .get_mut(doc.id())
                    .ok_or_else(|| not_found::<T>(doc.id()))?;
                *slot = doc;
                Ok(())
            }),
        ));
        self
    }

    /// Remove an existing document; the commit fails if it is absent.
    pub fn delete<T: Document>(&mut self, id: &str) -> &mut Self {
        let id = id.to_string();
        self.mutations.push((
            T::COLLECTION,
            Box::new(move |data| {
                T::table_mut(data)
                    .remove(&id)
                    .map(|_| ())
                    .ok_or_else(|| not_found::<T>(&id))
            }),
        ));
        self
    }

    /// Append to a request's audit history.
    pub fn append_audit(&mut self, request_id: &str, entry: AuditEntry) -> &mut Self {
        let parent_id = request_id.to_string();
        self.mutations.push((
            AUDIT_LOG,
            Box::new(move |data| {
                if !data.requests.contains_key(&parent_id) {
                    return Err(not_found::<Request>(&parent_id));
                }
                data.audit_log.push(HistoryRecord { parent_id, entry });
                Ok(())
            }),
        ));
        self
    }

    /// Append to a discharge assessment's review history.
    pub fn append_review(&mut self, assessment_id: &str, entry: ReviewEntry) -> &mut Self {
        let parent_id = assessment_id.to_string();
        self.mutations.push((
            REVIEW_LOG,
            Box::new(move |data| {
                if !data.discharges.contains_key(&parent_id) {
                    return Err(not_found::<DischargeAssessment>(&parent_id));
                }
                data.review_log.push(HistoryRecord { parent_id, entry });
                Ok(())
            }),
        ));
        self
    }
}

fn not_found<T: Document>(id: &str) -> RegulationError {
    RegulationError::NotFound {
        collection: T::COLLECTION,
        id: id.to_string(),
    }
}

/// In-process document store with optional JSON file persistence.
#[derive(Default)]
pub struct DocumentStore {
    data: StoreData,
    feeds: Feeds,
    path: Option<PathBuf>,
}

impl DocumentStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store persisted at `path`, loading it if the file exists.
    pub fn open(path: impl AsRef<Path>) -> RegulationResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            StoreData::default()
        };

        debug!("Opened document store at {}", path.display());
        Ok(DocumentStore {
            data,
            feeds: Feeds::default(),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply every mutation of the batch, or none of them.
    ///
    /// The new state is persisted before it becomes visible; subscribers of
    /// each touched collection are notified afterwards.
    pub fn commit(&mut self, batch: WriteBatch) -> RegulationResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let mut next = self.data.clone();
        let mut touched = BTreeSet::new();
        for (collection, mutation) in batch.mutations {
            mutation(&mut next)?;
            touched.insert(collection);
        }

        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        self.data = next;
        debug!("Committed {} mutation(s) touching {:?}", count, touched);

        for collection in touched {
            self.notify(collection);
        }
        Ok(())
    }

    pub fn insert<T: Document>(&mut self, doc: T) -> RegulationResult<String> {
        let mut batch = WriteBatch::new();
        let id = batch.set(doc);
        self.commit(batch)?;
        Ok(id)
    }

    pub fn update<T: Document>(&mut self, doc: T) -> RegulationResult<()> {
        let mut batch = WriteBatch::new();
        batch.update(doc);
        self.commit(batch)
    }

    pub fn delete<T: Document>(&mut self, id: &str) -> RegulationResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete::<T>(id);
        self.commit(batch)
    }

    pub fn get<T: Document>(&self, id: &str) -> Option<&T> {
        T::table(&self.data).get(id)
    }

    /// Owned copy of a document, or `NotFound`.
    pub fn fetch<T: Document>(&self, id: &str) -> RegulationResult<T> {
        self.get::<T>(id).cloned().ok_or_else(|| not_found::<T>(id))
    }

    pub fn all<T: Document>(&self) -> impl Iterator<Item = &T> {
        T::table(&self.data).values()
    }

    pub fn count<T: Document>(&self) -> usize {
        T::table(&self.data).len()
    }

    /// Documents matching `filter`, sorted by `order`.
    pub fn query<T, F, O>(&self, filter: F, mut order: O) -> Vec<T>
    where
        T: Document,
        F: Fn(&T) -> bool,
        O: FnMut(&T, &T) -> Ordering,
    {
        let mut docs: Vec<T> = self.all::<T>().filter(|doc| filter(doc)).cloned().collect();
        docs.sort_by(|a, b| order(a, b));
        docs
    }

    /// Subscribe to a query. The current result set is delivered right away.
    pub fn subscribe<T, F, O>(&mut self, filter: F, order: O) -> Subscription<T>
    where
        T: Document,
        F: Fn(&T) -> bool + 'static,
        O: Fn(&T, &T) -> Ordering + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let feed = Feed {
            filter: Box::new(filter),
            order: Box::new(order),
            tx,
        };
        if feed.push(&self.data) {
            T::feeds(&mut self.feeds).push(feed);
        }
        Subscription { rx }
    }

    /// Audit history of one request, in append order.
    pub fn history(&self, request_id: &str) -> Vec<&AuditEntry> {
        self.data
            .audit_log
            .iter()
            .filter(|record| record.parent_id == request_id)
            .map(|record| &record.entry)
            .collect()
    }

    /// The whole audit table, in append order.
    pub fn audit_log(&self) -> &[HistoryRecord<AuditEntry>] {
        &self.data.audit_log
    }

    /// Review history of one discharge assessment, in append order.
    pub fn reviews(&self, assessment_id: &str) -> Vec<&ReviewEntry> {
        self.data
            .review_log
            .iter()
            .filter(|record| record.parent_id == assessment_id)
            .map(|record| &record.entry)
            .collect()
    }

    fn notify(&mut self, collection: &str) {
        match collection {
            "units" => publish::<Unit>(&self.data, &mut self.feeds),
            "beds" => publish::<Bed>(&self.data, &mut self.feeds),
            "requests" => publish::<Request>(&self.data, &mut self.feeds),
            "discharges" => publish::<DischargeAssessment>(&self.data, &mut self.feeds),
            _ => {}
        }
    }
}

fn publish<T: Document>(data: &StoreData, feeds: &mut Feeds) {
    let feeds = T::feeds(feeds);
    let before = feeds.len();
    feeds.retain(|feed| feed.push(data));
    if feeds.len() < before {
        debug!(
            "Pruned {} closed subscription(s) on {}",
            before - feeds.len(),
            T::COLLECTION
        );
    }
}

fn persist(path: &Path, data: &StoreData) -> RegulationResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, data)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
