use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{
    authz::{self, Action, Authorizer},
    config::RuntimeConfig,
    engine::game::GameUpdate,
    error::{CoreError, CoreResult},
    model::{CourtOccupancy, PersonPatch, PublicPerson, Seat},
    publish::{Publication, PublishReport, Publisher},
    roster::Registration,
    store::Store,
    txn::Gate,
    types::{CourtId, PersonId, Position, Status},
};

use super::envelope::Reply;

/// Errors surfaced by [`ClubHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The operation itself failed.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// The writer loop is gone.
    #[error("runtime channel closed")]
    ChannelClosed,
}

impl RuntimeError {
    /// HTTP-style status code.
    pub fn status(&self) -> u16 {
        match self {
            RuntimeError::Core(err) => err.status(),
            RuntimeError::ChannelClosed => 500,
        }
    }
}

/// One request to the writer loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Sign up a new (suspended) person.
    Register(Registration),
    /// Check sign-in credentials.
    Authenticate {
        /// Sign-in email.
        email: String,
        /// Plain password.
        password: String,
    },
    /// Load one person.
    Person {
        /// Person to load.
        id: PersonId,
    },
    /// List people, optionally filtered by status.
    People {
        /// Status filter.
        filter: Option<Status>,
    },
    /// Apply a profile patch.
    UpdatePerson {
        /// Person to edit.
        id: PersonId,
        /// Fields to overwrite.
        patch: PersonPatch,
    },
    /// Promote an inactive person to player.
    MakePersonPlayer {
        /// Person to promote.
        id: PersonId,
    },
    /// Move a person to inactive.
    MakePersonInactive {
        /// Person to demote.
        id: PersonId,
    },
    /// Delete a non-admin person.
    DeletePerson {
        /// Person to delete.
        id: PersonId,
    },
    /// Load one court with occupancy.
    Court {
        /// Court to load.
        id: CourtId,
    },
    /// List courts with occupancy.
    Courts,
    /// Create a court.
    CreateCourt {
        /// Display name.
        name: String,
    },
    /// Rename a court.
    RenameCourt {
        /// Court to rename.
        id: CourtId,
        /// New display name.
        name: String,
    },
    /// Delete a court, re-queueing its players.
    DeleteCourt {
        /// Court to delete.
        id: CourtId,
    },
    /// Seat waiting players on a court's empty positions.
    FillCourt {
        /// Court to fill.
        id: CourtId,
    },
    /// Vacate a court.
    ClearCourt {
        /// Court to clear.
        id: CourtId,
    },
    /// Send a player to the back of the queue.
    MakePlayerWait {
        /// Player to queue.
        person: PersonId,
    },
    /// Seat a player at an explicit position.
    MakePlayerPlay {
        /// Player to seat.
        person: PersonId,
        /// Target court.
        court: CourtId,
        /// Target position.
        position: Position,
    },
    /// Apply a batch of position edits.
    UpdateGame(GameUpdate),
    /// Current waiting queue in FIFO order.
    Waiters,
    /// Run the consistency auditor.
    CheckConsistency {
        /// Repair what is found.
        fix: bool,
    },
    /// Remove courts, queue rows and non-admin people.
    DeleteAllRecords,
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::Register(_) => "register",
            Operation::Authenticate { .. } => "authenticate",
            Operation::Person { .. } => "person",
            Operation::People { .. } => "people",
            Operation::UpdatePerson { .. } => "update_person",
            Operation::MakePersonPlayer { .. } => "make_person_player",
            Operation::MakePersonInactive { .. } => "make_person_inactive",
            Operation::DeletePerson { .. } => "delete_person",
            Operation::Court { .. } => "court",
            Operation::Courts => "courts",
            Operation::CreateCourt { .. } => "create_court",
            Operation::RenameCourt { .. } => "rename_court",
            Operation::DeleteCourt { .. } => "delete_court",
            Operation::FillCourt { .. } => "fill_court",
            Operation::ClearCourt { .. } => "clear_court",
            Operation::MakePlayerWait { .. } => "make_player_wait",
            Operation::MakePlayerPlay { .. } => "make_player_play",
            Operation::UpdateGame(_) => "update_game",
            Operation::Waiters => "waiters",
            Operation::CheckConsistency { .. } => "check_consistency",
            Operation::DeleteAllRecords => "delete_all_records",
        }
    }

    /// Action the actor must be granted, if any.
    fn required_action(&self, actor: Option<PersonId>) -> Option<Action> {
        let on_person = |id: PersonId| {
            if actor == Some(id) {
                Action::EditSelf
            } else {
                Action::EditOthers
            }
        };
        match self {
            Operation::Register(_)
            | Operation::Authenticate { .. }
            | Operation::Person { .. }
            | Operation::People { .. }
            | Operation::Court { .. }
            | Operation::Courts
            | Operation::Waiters => None,
            Operation::UpdatePerson { id, .. }
            | Operation::MakePersonPlayer { id }
            | Operation::MakePersonInactive { id }
            | Operation::DeletePerson { id } => Some(on_person(*id)),
            Operation::CreateCourt { .. }
            | Operation::RenameCourt { .. }
            | Operation::DeleteCourt { .. }
            | Operation::FillCourt { .. }
            | Operation::ClearCourt { .. }
            | Operation::MakePlayerWait { .. }
            | Operation::MakePlayerPlay { .. }
            | Operation::UpdateGame(_) => Some(Action::EditCourt),
            Operation::CheckConsistency { .. } | Operation::DeleteAllRecords => {
                Some(Action::EditOthers)
            }
        }
    }

    fn is_mutation(&self) -> bool {
        match self {
            Operation::Authenticate { .. }
            | Operation::Person { .. }
            | Operation::People { .. }
            | Operation::Court { .. }
            | Operation::Courts
            | Operation::Waiters => false,
            Operation::CheckConsistency { fix } => *fix,
            _ => true,
        }
    }
}

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    /// Nothing to return.
    Done,
    /// Newly created person or court id.
    Created(i64),
    /// One person.
    Person(PublicPerson),
    /// Several people.
    People(Vec<PublicPerson>),
    /// One court.
    Court(CourtOccupancy),
    /// Several courts.
    Courts(Vec<CourtOccupancy>),
    /// Seats of the affected court after the change.
    Seats(Vec<Seat>),
    /// Person ids, e.g. those re-queued by a clear or the waiting queue.
    PersonIds(Vec<PersonId>),
    /// Violations found by the auditor.
    Violations(usize),
}

enum Command {
    Execute {
        actor: Option<PersonId>,
        op: Operation,
        resp: oneshot::Sender<Result<Outcome, RuntimeError>>,
    },
    Publish {
        reset: bool,
        resp: oneshot::Sender<Result<PublishReport, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Cloneable front end of the writer loop.
#[derive(Clone)]
pub struct ClubHandle {
    cmd_tx: mpsc::Sender<Command>,
    publications_tx: broadcast::Sender<Publication>,
}

/// Starts the writer loop on a blocking task. It owns `store`, `publisher`
/// and `authorizer` and serializes every operation.
///
/// Must be called from within a tokio runtime.
pub fn spawn_club(
    store: Store,
    publisher: Publisher,
    authorizer: Box<dyn Authorizer>,
    config: RuntimeConfig,
) -> ClubHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (publications_tx, _) = broadcast::channel::<Publication>(config.publication_capacity.max(1));

    let mut writer = Writer {
        store,
        publisher,
        authorizer,
        publications_tx: publications_tx.clone(),
        publish_after_mutation: config.publish_after_mutation,
    };

    tokio::task::spawn_blocking(move || {
        while let Some(cmd) = cmd_rx.blocking_recv() {
            match cmd {
                Command::Execute { actor, op, resp } => {
                    let _ = resp.send(writer.execute(actor, op).map_err(RuntimeError::from));
                }
                Command::Publish { reset, resp } => {
                    if reset {
                        writer.publisher.reset();
                    }
                    let _ = resp.send(writer.publish().map_err(RuntimeError::from));
                }
                Command::Shutdown { resp } => {
                    let _ = resp.send(());
                    break;
                }
            }
        }
        info!("club runtime stopped");
    });

    ClubHandle {
        cmd_tx,
        publications_tx,
    }
}

impl ClubHandle {
    /// Receives every publication written after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Publication> {
        self.publications_tx.subscribe()
    }

    /// Runs `op` on behalf of `actor` (`None` for anonymous callers).
    pub async fn execute(
        &self,
        actor: Option<PersonId>,
        op: Operation,
    ) -> Result<Outcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Execute { actor, op, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Like [`ClubHandle::execute`] but wraps the result in a [`Reply`].
    pub async fn reply(&self, actor: Option<PersonId>, op: Operation) -> Reply {
        Reply::from_result(self.execute(actor, op).await)
    }

    /// Runs a publish cycle outside any mutation.
    pub async fn publish_now(&self) -> Result<PublishReport, RuntimeError> {
        self.publish(false).await
    }

    /// Forgets the publication memo and republishes every topic.
    pub async fn resync(&self) -> Result<PublishReport, RuntimeError> {
        self.publish(true).await
    }

    async fn publish(&self, reset: bool) -> Result<PublishReport, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Publish { reset, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Stops the writer loop after queued commands drain.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

struct Writer {
    store: Store,
    publisher: Publisher,
    authorizer: Box<dyn Authorizer>,
    publications_tx: broadcast::Sender<Publication>,
    publish_after_mutation: bool,
}

impl Writer {
    fn execute(&mut self, actor: Option<PersonId>, op: Operation) -> CoreResult<Outcome> {
        let label = op.label();
        if let Some(action) = op.required_action(actor) {
            self.authorize(actor, action)?;
        }
        let mutates = op.is_mutation();

        let outcome = self.apply(op).inspect_err(|err| {
            debug!(op = label, error = %err, "operation failed");
        })?;

        if mutates && self.publish_after_mutation {
            // The mutation is already committed; a failed cycle only delays views.
            if let Err(err) = self.publish() {
                warn!(op = label, error = %err, "publish after mutation failed");
            }
        }
        Ok(outcome)
    }

    fn authorize(&self, actor: Option<PersonId>, action: Action) -> CoreResult<()> {
        let Some(actor) = actor else {
            return Err(CoreError::Forbidden("sign-in required".to_string()));
        };
        let person = match self.store.person_record(actor) {
            Ok(person) => person,
            Err(CoreError::NotFound(_)) => {
                return Err(CoreError::Forbidden(format!("unknown actor [{actor}]")));
            }
            Err(err) => return Err(err),
        };
        authz::require(self.authorizer.as_ref(), &person, action)
    }

    fn apply(&mut self, op: Operation) -> CoreResult<Outcome> {
        let store = &mut self.store;
        Ok(match op {
            Operation::Register(registration) => Outcome::Created(store.register(registration)?),
            Operation::Authenticate { email, password } => {
                Outcome::Person(store.authenticate(&email, &password)?)
            }
            Operation::Person { id } => Outcome::Person(store.person(id)?),
            Operation::People { filter } => Outcome::People(store.people(filter)?),
            Operation::UpdatePerson { id, patch } => {
                Outcome::Person(store.update_person(id, &patch)?)
            }
            Operation::MakePersonPlayer { id } => {
                store.make_person_player(id)?;
                Outcome::Done
            }
            Operation::MakePersonInactive { id } => {
                store.make_person_inactive(id)?;
                Outcome::Done
            }
            Operation::DeletePerson { id } => {
                store.delete_person(id)?;
                Outcome::Done
            }
            Operation::Court { id } => Outcome::Court(store.court_occupancy(id)?),
            Operation::Courts => Outcome::Courts(store.courts()?),
            Operation::CreateCourt { name } => Outcome::Created(store.create_court(&name)?),
            Operation::RenameCourt { id, name } => {
                store.rename_court(id, &name)?;
                Outcome::Done
            }
            Operation::DeleteCourt { id } => {
                store.delete_court(id)?;
                Outcome::Done
            }
            Operation::FillCourt { id } => Outcome::Seats(store.fill_court(id)?),
            Operation::ClearCourt { id } => Outcome::PersonIds(store.clear_court(id)?),
            Operation::MakePlayerWait { person } => {
                store.make_player_wait(person)?;
                Outcome::Done
            }
            Operation::MakePlayerPlay {
                person,
                court,
                position,
            } => {
                store.make_player_play(person, court, position)?;
                Outcome::Done
            }
            Operation::UpdateGame(update) => Outcome::Seats(store.update_game(&update)?),
            Operation::Waiters => Outcome::PersonIds(store.waiting_queue()?),
            Operation::CheckConsistency { fix } => {
                Outcome::Violations(store.check_consistency(fix, Gate::Audited)?)
            }
            Operation::DeleteAllRecords => {
                store.delete_all_records(Gate::Audited)?;
                Outcome::Done
            }
        })
    }

    fn publish(&mut self) -> CoreResult<PublishReport> {
        let mut sink = self.publications_tx.clone();
        self.publisher.publish_store(&self.store, &mut sink)
    }
}
