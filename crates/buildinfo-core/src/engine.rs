//! The publish engine.
//!
//! Uploads a build's artifacts, generated descriptors, and finally the
//! build-info document, in that order: a partially visible remote state
//! must never reference a build-info document whose artifacts are missing.
//! Artifact uploads within a module run on a bounded worker pool; the
//! descriptor and build-info steps run only after every artifact upload for
//! the module has joined.
//!
//! Once uploading begins, per-item failures are reported through the
//! returned [`PublishReceipt`] rather than `Err`: a 4xx response aborts the
//! remaining plan and marks untouched items not-attempted, while transient
//! failures are retried under the configured backoff first.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use buildinfo_client::{ClientError, DeployDetails, RepositoryClient};
use buildinfo_config::{ArtifactKind, PublicationRegistry, PublicationSpec, PublisherOptions};
use buildinfo_retry::{Classified, Retrier};
use buildinfo_types::{
    BuildInfo, ItemKind, ItemReceipt, ItemState, Module, OverallStatus, PublishReceipt,
};
use chrono::Utc;

use crate::descriptor;
use crate::error::PublishError;
use crate::events::{EventKind, EventLog, RunEvent};

/// Deployment property carrying the build name.
pub const PROP_BUILD_NAME: &str = "build.name";
/// Deployment property carrying the build number.
pub const PROP_BUILD_NUMBER: &str = "build.number";
/// Deployment property carrying the build start time (epoch millis).
pub const PROP_BUILD_TIMESTAMP: &str = "build.timestamp";

/// Run-level cancellation token.
///
/// Cancelling prevents new uploads from starting; already-uploaded
/// artifacts are not rolled back (an accepted inconsistency window).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum Payload {
    /// An artifact file on disk.
    File(DeployDetails),
    /// Generated descriptor bytes.
    Bytes { path: String, bytes: Vec<u8> },
}

#[derive(Debug)]
struct PlannedItem {
    module: String,
    kind: ItemKind,
    path: String,
    payload: Payload,
    state: Mutex<ItemState>,
}

#[derive(Debug)]
struct ModulePlan {
    artifacts: Vec<PlannedItem>,
    descriptors: Vec<PlannedItem>,
}

/// Publishes assembled builds to one repository manager.
pub struct Publisher {
    client: RepositoryClient,
    options: PublisherOptions,
    registry: PublicationRegistry,
    retrier: Retrier,
    events: Mutex<EventLog>,
}

impl Publisher {
    /// Create a publisher over a client, options, and publication registry.
    pub fn new(
        client: RepositoryClient,
        options: PublisherOptions,
        registry: PublicationRegistry,
    ) -> Self {
        let retrier = Retrier::new(options.retry.clone());
        Self {
            client,
            options,
            registry,
            retrier,
            events: Mutex::new(EventLog::new()),
        }
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().events().to_vec()
    }

    /// Append recorded events to a JSONL file.
    pub fn write_events(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.events.lock().unwrap().write_to_file(path)
    }

    /// Publish a build: artifacts, then descriptors, then the document.
    ///
    /// Fails before any upload on configuration problems or when the
    /// (name, number) pair is already published and overwrite is off.
    /// After uploading begins, the outcome is always a receipt.
    pub fn publish(
        &self,
        build: &BuildInfo,
        cancel: &CancelToken,
    ) -> Result<PublishReceipt, PublishError> {
        let started_at = Utc::now();

        if !cancel.is_cancelled() && !self.options.overwrite {
            match self.client.build_exists(&build.name, &build.number) {
                Ok(true) => {
                    return Err(PublishError::DuplicatePublish {
                        name: build.name.clone(),
                        number: build.number.clone(),
                    });
                }
                Ok(false) => {}
                Err(source) => return Err(PublishError::Preflight { source }),
            }
        }

        let plans = self.plan(build);
        self.record(EventKind::RunStarted {
            build_name: build.name.clone(),
            build_number: build.number.clone(),
        });

        let abort = AtomicBool::new(false);
        'modules: for plan in &plans {
            if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
                break;
            }
            self.upload_pool(&plan.artifacts, cancel, &abort);
            if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
                break;
            }
            // Join barrier passed: every artifact of this module is up.
            for item in &plan.descriptors {
                if cancel.is_cancelled() {
                    break 'modules;
                }
                if !self.upload_item(item) {
                    abort.store(true, Ordering::SeqCst);
                    break 'modules;
                }
            }
        }

        let artifacts_done = plans.iter().all(|plan| {
            plan.artifacts
                .iter()
                .chain(plan.descriptors.iter())
                .all(|item| {
                    matches!(
                        *item.state.lock().unwrap(),
                        ItemState::Uploaded | ItemState::Skipped { .. }
                    )
                })
        });

        let mut document_state = ItemState::NotAttempted;
        if artifacts_done && !cancel.is_cancelled() && !abort.load(Ordering::SeqCst) {
            document_state = self.upload_build_info(build);
        }

        let mut items = Vec::new();
        for plan in &plans {
            for item in plan.artifacts.iter().chain(plan.descriptors.iter()) {
                items.push(ItemReceipt {
                    module: item.module.clone(),
                    path: item.path.clone(),
                    kind: item.kind,
                    state: item.state.lock().unwrap().clone(),
                });
            }
        }
        let document_uploaded = matches!(document_state, ItemState::Uploaded);
        items.push(ItemReceipt {
            module: "build".to_string(),
            path: document_path(build),
            kind: ItemKind::BuildInfo,
            state: document_state,
        });

        let any_failed = items
            .iter()
            .any(|item| matches!(item.state, ItemState::Failed { .. }));
        let status = if any_failed {
            OverallStatus::Failed
        } else if document_uploaded {
            OverallStatus::Success
        } else {
            OverallStatus::Partial
        };

        self.record(EventKind::RunFinished { status });

        Ok(PublishReceipt {
            build_name: build.name.clone(),
            build_number: build.number.clone(),
            started_at,
            finished_at: Utc::now(),
            items,
            status,
        })
    }

    /// Union of artifact kinds across all registered publication specs,
    /// falling back to the global toggles when nothing is registered.
    fn effective_kinds(&self) -> BTreeSet<ArtifactKind> {
        if self.registry.is_empty() {
            PublicationSpec::from_options("default", &self.options).kinds
        } else {
            self.registry
                .specs()
                .flat_map(|spec| spec.kinds.iter().copied())
                .collect()
        }
    }

    fn plan(&self, build: &BuildInfo) -> Vec<ModulePlan> {
        let kinds = self.effective_kinds();
        let main_enabled = kinds.contains(&ArtifactKind::Main);
        let properties = build_properties(build);

        build
            .modules
            .iter()
            .map(|module| self.plan_module(module, &kinds, main_enabled, &properties))
            .collect()
    }

    fn plan_module(
        &self,
        module: &Module,
        kinds: &BTreeSet<ArtifactKind>,
        main_enabled: bool,
        properties: &BTreeMap<String, String>,
    ) -> ModulePlan {
        let module_id = module.id.to_string();

        let artifacts = module
            .artifacts
            .iter()
            .map(|artifact| {
                let state = if main_enabled {
                    ItemState::NotAttempted
                } else {
                    ItemState::Skipped {
                        reason: "artifact publishing disabled".to_string(),
                    }
                };
                PlannedItem {
                    module: module_id.clone(),
                    kind: ItemKind::Artifact,
                    path: artifact.remote_path.clone(),
                    payload: Payload::File(DeployDetails {
                        repo_key: self.options.repo_key.clone(),
                        artifact_path: artifact.remote_path.clone(),
                        file: artifact.local_path.clone(),
                        sha1: artifact.sha1.clone(),
                        md5: artifact.md5.clone(),
                        properties: properties.clone(),
                    }),
                    state: Mutex::new(state),
                }
            })
            .collect();

        let mut descriptors = Vec::new();
        if kinds.contains(&ArtifactKind::Pom) {
            let path = descriptor::pom_path(&module.id);
            descriptors.push(PlannedItem {
                module: module_id.clone(),
                kind: ItemKind::Pom,
                path: path.clone(),
                payload: Payload::Bytes {
                    path,
                    bytes: descriptor::maven_pom(module).into_bytes(),
                },
                state: Mutex::new(ItemState::NotAttempted),
            });
        }
        if kinds.contains(&ArtifactKind::Ivy) {
            let path = descriptor::ivy_path(&module.id);
            descriptors.push(PlannedItem {
                module: module_id.clone(),
                kind: ItemKind::Ivy,
                path: path.clone(),
                payload: Payload::Bytes {
                    path,
                    bytes: descriptor::ivy_descriptor(module).into_bytes(),
                },
                state: Mutex::new(ItemState::NotAttempted),
            });
        }

        ModulePlan {
            artifacts,
            descriptors,
        }
    }

    /// Upload a module's artifacts on a bounded worker pool.
    ///
    /// Returns after every worker joins; pending items are left
    /// not-attempted when cancellation or a fatal failure intervenes.
    fn upload_pool(&self, items: &[PlannedItem], cancel: &CancelToken, abort: &AtomicBool) {
        let pending: VecDeque<&PlannedItem> = items
            .iter()
            .filter(|item| matches!(*item.state.lock().unwrap(), ItemState::NotAttempted))
            .collect();
        if pending.is_empty() {
            return;
        }
        let workers = self.options.max_workers.clamp(1, pending.len());
        let queue = Mutex::new(pending);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let item = { queue.lock().unwrap().pop_front() };
                        let Some(item) = item else { break };
                        if cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                            continue;
                        }
                        if !self.upload_item(item) {
                            abort.store(true, Ordering::SeqCst);
                        }
                    }
                });
            }
        });
    }

    /// Upload one item under the retry policy. Returns false on failure.
    fn upload_item(&self, item: &PlannedItem) -> bool {
        self.record(EventKind::UploadStarted {
            module: item.module.clone(),
            path: item.path.clone(),
            kind: item.kind,
        });

        let result = self.retrier.run_classified(|attempt| {
            self.send(item).map(|()| attempt).map_err(|error| Classified {
                retryable: error.is_retryable(),
                error,
            })
        });

        match result {
            Ok(attempts) => {
                *item.state.lock().unwrap() = ItemState::Uploaded;
                self.record(EventKind::UploadCompleted {
                    module: item.module.clone(),
                    path: item.path.clone(),
                    kind: item.kind,
                    attempts,
                });
                true
            }
            Err(error) => {
                let class = error.class();
                let message = error.to_string();
                *item.state.lock().unwrap() = ItemState::Failed {
                    class,
                    message: message.clone(),
                };
                self.record(EventKind::UploadFailed {
                    module: item.module.clone(),
                    path: item.path.clone(),
                    kind: item.kind,
                    class,
                    message,
                });
                false
            }
        }
    }

    fn send(&self, item: &PlannedItem) -> Result<(), ClientError> {
        match &item.payload {
            Payload::File(details) => self.client.deploy_artifact(details),
            Payload::Bytes { path, bytes } => {
                self.client
                    .deploy_bytes(&self.options.repo_key, path, bytes.clone())
            }
        }
    }

    fn upload_build_info(&self, build: &BuildInfo) -> ItemState {
        let result = self.retrier.run_classified(|_| {
            self.client.put_build_info(build).map_err(|error| Classified {
                retryable: error.is_retryable(),
                error,
            })
        });
        match result {
            Ok(()) => {
                self.record(EventKind::BuildInfoPublished);
                ItemState::Uploaded
            }
            Err(error) => {
                let class = error.class();
                let message = error.to_string();
                self.record(EventKind::UploadFailed {
                    module: "build".to_string(),
                    path: document_path(build),
                    kind: ItemKind::BuildInfo,
                    class,
                    message: message.clone(),
                });
                ItemState::Failed { class, message }
            }
        }
    }

    fn record(&self, kind: EventKind) {
        self.events.lock().unwrap().record(kind);
    }
}

/// Receipt and event path for the build-info document itself.
fn document_path(build: &BuildInfo) -> String {
    format!("api/build/{}/{}", build.name, build.number)
}

/// Build-identifying properties attached to every deployed artifact.
fn build_properties(build: &BuildInfo) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    properties.insert(PROP_BUILD_NAME.to_string(), build.name.clone());
    properties.insert(PROP_BUILD_NUMBER.to_string(), build.number.clone());
    properties.insert(
        PROP_BUILD_TIMESTAMP.to_string(),
        build.started.timestamp_millis().to_string(),
    );
    properties
}
