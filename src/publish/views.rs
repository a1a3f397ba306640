use rusqlite::Connection;
use serde::Serialize;

use crate::{
    courts::list_courts,
    error::CoreResult,
    model::{DisplayWaiter, PublicPerson},
    store::rows,
    types::Status,
};

/// A computed topic payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Logical topic.
    pub topic: String,
    /// Serialized content.
    pub payload: String,
}

impl Entry {
    /// Serializes `value` as JSON under `topic`.
    pub fn json<T: Serialize + ?Sized>(topic: impl Into<String>, value: &T) -> CoreResult<Self> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_string(value)?,
        })
    }
}

/// Computes one family of topics from the store.
pub trait View: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;
    /// Computes this view's entries.
    fn entries(&self, conn: &Connection) -> CoreResult<Vec<Entry>>;
}

/// `getCourts` plus one `getCourt/{id}` per court.
#[derive(Debug, Default, Clone, Copy)]
pub struct CourtsView;

impl View for CourtsView {
    fn name(&self) -> &'static str {
        "courts"
    }

    fn entries(&self, conn: &Connection) -> CoreResult<Vec<Entry>> {
        let courts = list_courts(conn)?;
        let mut out = Vec::with_capacity(courts.len() + 1);
        out.push(Entry::json("getCourts", &courts)?);
        for court in &courts {
            out.push(Entry::json(format!("getCourt/{}", court.id), court)?);
        }
        Ok(out)
    }
}

/// `getPeople/{filter}` lists plus one `getPerson/{id}` per person.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeopleView;

const PEOPLE_FILTERS: [(&str, Status); 3] = [
    ("players", Status::Player),
    ("inactive", Status::Inactive),
    ("suspended", Status::Suspended),
];

impl View for PeopleView {
    fn name(&self) -> &'static str {
        "people"
    }

    fn entries(&self, conn: &Connection) -> CoreResult<Vec<Entry>> {
        let everyone: Vec<PublicPerson> = rows::list_people(conn, None)?
            .iter()
            .map(|p| p.to_public())
            .collect();

        let mut out = Vec::with_capacity(everyone.len() + PEOPLE_FILTERS.len() + 1);
        for person in &everyone {
            out.push(Entry::json(format!("getPerson/{}", person.id), person)?);
        }
        out.push(Entry::json("getPeople/all", &everyone)?);

        for (filter, status) in PEOPLE_FILTERS {
            let subset: Vec<&PublicPerson> =
                everyone.iter().filter(|p| p.status == status).collect();
            out.push(Entry::json(format!("getPeople/{filter}"), &subset)?);
        }
        Ok(out)
    }
}

/// `getWaiters`: the queue in FIFO order with display names.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitersView;

impl View for WaitersView {
    fn name(&self) -> &'static str {
        "waiters"
    }

    fn entries(&self, conn: &Connection) -> CoreResult<Vec<Entry>> {
        let mut waiters = Vec::new();
        for entry in rows::list_waiters(conn)? {
            let person = rows::require_person(conn, entry.person)?;
            waiters.push(DisplayWaiter {
                person_id: person.id,
                knownas: person.knownas,
                enqueued_at_ms: entry.enqueued_at_ms,
            });
        }
        Ok(vec![Entry::json("getWaiters", &waiters)?])
    }
}

/// Courts, people, then waiters.
pub fn default_views() -> Vec<Box<dyn View>> {
    vec![Box::new(CourtsView), Box::new(PeopleView), Box::new(WaitersView)]
}
