use std::{
    convert::Infallible,
    io,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use procureflow_approvals::{AuthorizationMatrix, DocumentType};
use procureflow_auth::Role;
use procureflow_core::{AggregateId, DomainResult};
use procureflow_events::{EventEnvelope, InMemoryEventBus};
use procureflow_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    document::Document,
    event_store::InMemoryEventStore,
    flow::ProcurementFlow,
    numbering::{DocumentNumberer, NumberSeries},
    projections::ReadModels,
    workers::{BusWorker, WorkerHandle},
};

type InMemoryBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

pub type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryBus>>;

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub topic: &'static str,
    pub payload: JsonValue,
}

/// Everything the handlers need: the dispatcher, the read models, the
/// authorization matrix and the document numbering.
///
/// A background bus worker keeps the read models current and runs the
/// procurement flow for every committed event.
pub struct AppServices {
    dispatcher: Arc<InMemoryDispatcher>,
    read_models: ReadModels,
    matrix: Arc<RwLock<AuthorizationMatrix>>,
    numberer: Arc<DocumentNumberer>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    /// In-memory wiring: store + bus + read models + flow worker.
    pub fn in_memory(matrix: AuthorizationMatrix) -> io::Result<Self> {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Arc<InMemoryBus> = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));

        let read_models = ReadModels::in_memory();
        let matrix = Arc::new(RwLock::new(matrix));
        let numberer = Arc::new(DocumentNumberer::new());
        let flow = ProcurementFlow::new(dispatcher.clone(), matrix.clone(), numberer.clone());

        // Lossy: a slow SSE client never blocks the worker.
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

        let worker = {
            let read_models = read_models.clone();
            let realtime_tx = realtime_tx.clone();
            BusWorker::spawn("procurement-bus", &bus, move |env: EventEnvelope<JsonValue>| {
                // Projection failures are logged by `apply_envelope`; the flow
                // reads aggregates directly and still runs.
                let _ = read_models.apply_envelope(&env);
                let _ = realtime_tx.send(realtime_message(&read_models, &env));
                flow.handle(&env).map(|_| ())
            })?
        };

        Ok(Self {
            dispatcher,
            read_models,
            matrix,
            numberer,
            realtime_tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    /// Dispatch a command and return the document as it stands afterwards.
    pub fn dispatch<A: Document>(&self, aggregate_id: AggregateId, command: A::Command) -> Result<A, DispatchError> {
        Ok(self.dispatcher.dispatch::<A>(aggregate_id, command)?.state)
    }

    /// Rehydrate a document from its stream (strongly consistent read).
    pub fn load<A: Document>(&self, aggregate_id: AggregateId) -> Result<A, DispatchError> {
        self.dispatcher.load::<A>(aggregate_id)?.ok_or(DispatchError::NotFound)
    }

    /// Like [`AppServices::load`] but `None` for a document that does not exist.
    pub fn try_load<A: Document>(&self, aggregate_id: AggregateId) -> Result<Option<A>, DispatchError> {
        self.dispatcher.load::<A>(aggregate_id)
    }

    pub fn next_number(&self, series: NumberSeries) -> String {
        self.numberer.next(series, Utc::now())
    }

    pub fn matrix(&self) -> AuthorizationMatrix {
        self.matrix.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the matrix after validating it. In-flight documents keep
    /// the chain they snapshotted when they were created.
    pub fn replace_matrix(&self, matrix: AuthorizationMatrix) -> DomainResult<()> {
        matrix.validate()?;
        *self.matrix.write().unwrap_or_else(PoisonError::into_inner) = matrix;
        tracing::info!("authorization matrix replaced");
        Ok(())
    }

    pub fn resolve_levels(
        &self,
        document_type: DocumentType,
        department: Option<&str>,
        amount_minor: u64,
    ) -> DomainResult<Vec<Role>> {
        self.matrix
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(document_type, department, amount_minor)
    }

    pub fn subscribe_realtime(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.realtime_tx.subscribe()
    }

    /// Stop the background worker (idempotent).
    pub fn shutdown(&self) {
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}

fn realtime_message(read_models: &ReadModels, env: &EventEnvelope<JsonValue>) -> RealtimeMessage {
    let status = read_models
        .history
        .for_document(env.aggregate_id())
        .into_iter()
        .find(|h| h.sequence_number == env.sequence_number())
        .map(|h| h.to);

    let topic = if status.is_some() { "status_changed" } else { "document_updated" };
    let payload = serde_json::json!({
        "document_type": env.aggregate_type(),
        "document_id": env.aggregate_id().to_string(),
        "sequence_number": env.sequence_number(),
        "event_type": env.event_type(),
        "occurred_at": env.occurred_at(),
        "status": status,
    });

    RealtimeMessage { topic, payload }
}

pub fn sse_stream(
    rx: broadcast::Receiver<RealtimeMessage>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
