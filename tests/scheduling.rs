mod common;

use chrono::{Duration, NaiveDate, Utc};
use common::*;
use screening_booking::error::{translate_schedule_conflict, EngineError};
use screening_booking::models::Event;
use screening_booking::services::events::EventChanges;
use screening_booking::services::ledger::BookingLedger;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn concurrent_overlapping_admissions_admit_exactly_one() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 20, host).await;
    let events = event_service(&pool);

    let first = events.create_event(new_event(hall.id, next_week_at(10, 0), 3600, 2), host);
    let second = events.create_event(new_event(hall.id, next_week_at(10, 30), 3600, 2), host);
    let (a, b) = futures::join!(first, second);

    let admitted = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(admitted, 1);
    let rejected = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(rejected, EngineError::LocationOccupied), "{rejected:?}");
}

#[tokio::test]
async fn touching_events_do_not_conflict() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 10, host).await;
    let events = event_service(&pool);

    events
        .create_event(new_event(hall.id, next_week_at(12, 0), 1800, 1), host)
        .await
        .unwrap();
    events
        .create_event(new_event(hall.id, next_week_at(12, 30), 1800, 1), host)
        .await
        .unwrap();
}

#[tokio::test]
async fn closing_time_is_inclusive() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 10, host).await;
    let events = event_service(&pool);

    let late = events
        .create_event(new_event(hall.id, next_week_at(21, 31), 1800, 1), host)
        .await;
    assert!(matches!(late, Err(EngineError::OutsideWorkingHours { .. })));

    events
        .create_event(new_event(hall.id, next_week_at(21, 30), 1800, 1), host)
        .await
        .unwrap();
}

#[tokio::test]
async fn participants_are_bounded_by_capacity() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 50, host).await;
    let events = event_service(&pool);

    let too_many = events
        .create_event(new_event(hall.id, next_week_at(14, 0), 3600, 51), host)
        .await;
    assert!(matches!(
        too_many,
        Err(EngineError::InvalidParticipants { requested: 51, capacity: 50 })
    ));

    let full = events
        .create_event(new_event(hall.id, next_week_at(14, 0), 3600, 50), host)
        .await
        .unwrap();
    let (view, vacant) = events.get_event(full.id).await.unwrap();
    assert_eq!(view.vacant_seats, 0);
    assert!(vacant.is_empty());
}

#[tokio::test]
async fn growing_past_the_vacant_seats_is_insufficient() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 50, host).await;
    let events = event_service(&pool);
    let ledger = BookingLedger::new(pool.clone());

    let event = events
        .create_event(new_event(hall.id, next_week_at(16, 0), 3600, 1), host)
        .await
        .unwrap();
    let (_, vacant) = events.get_event(event.id).await.unwrap();
    ledger.reserve(event.id, vacant[0].id, Uuid::new_v4()).await.unwrap();

    let grown = events
        .edit_event(
            event.id,
            EventChanges {
                participants: Some(50),
                ..Default::default()
            },
            host,
        )
        .await;
    assert!(matches!(
        grown,
        Err(EngineError::InsufficientSeats { requested: 49, vacant: 48 })
    ));

    let shrunk = events
        .edit_event(
            event.id,
            EventChanges {
                participants: Some(49),
                ..Default::default()
            },
            host,
        )
        .await
        .unwrap();
    assert_eq!(shrunk.participants, 49);
    let (view, _) = events.get_event(event.id).await.unwrap();
    assert_eq!(view.vacant_seats, 0);
}

#[tokio::test]
async fn only_the_host_edits_and_deletes() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 10, host).await;
    let events = event_service(&pool);

    let event = events
        .create_event(new_event(hall.id, next_week_at(18, 0), 3600, 3), host)
        .await
        .unwrap();

    let stranger = Uuid::new_v4();
    assert!(matches!(
        events.delete_event(event.id, stranger).await,
        Err(EngineError::Forbidden(_))
    ));
    events.delete_event(event.id, host).await.unwrap();
    assert!(matches!(
        events.get_event(event.id).await,
        Err(EngineError::EventNotFound(_))
    ));
}

#[tokio::test]
async fn editing_start_and_duration_moves_the_window() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 10, host).await;
    let events = event_service(&pool);

    let event = events
        .create_event(new_event(hall.id, next_week_at(10, 0), 3600, 2), host)
        .await
        .unwrap();

    let moved = events
        .edit_event(
            event.id,
            EventChanges {
                start: Some(next_week_at(12, 0)),
                ..Default::default()
            },
            host,
        )
        .await
        .unwrap();
    assert_eq!(moved.start, next_week_at(12, 0));
    assert_eq!(moved.finish, next_week_at(13, 0));

    let longer = events
        .edit_event(
            event.id,
            EventChanges {
                duration: Some(7200),
                ..Default::default()
            },
            host,
        )
        .await
        .unwrap();
    assert_eq!(longer.duration, 7200);
    assert_eq!(longer.finish, next_week_at(14, 0));

    // The old slot is free again, the new one is taken.
    events
        .create_event(new_event(hall.id, next_week_at(10, 0), 3600, 1), host)
        .await
        .unwrap();
    let clash = events
        .create_event(new_event(hall.id, next_week_at(13, 30), 1800, 1), host)
        .await;
    assert!(matches!(clash, Err(EngineError::LocationOccupied)), "{clash:?}");
}

#[tokio::test]
async fn editing_into_another_event_is_occupied() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 10, host).await;
    let events = event_service(&pool);

    events
        .create_event(new_event(hall.id, next_week_at(15, 0), 3600, 1), host)
        .await
        .unwrap();
    let early = events
        .create_event(new_event(hall.id, next_week_at(13, 0), 3600, 1), host)
        .await
        .unwrap();

    let stretched = events
        .edit_event(
            early.id,
            EventChanges {
                duration: Some(9000),
                ..Default::default()
            },
            host,
        )
        .await;
    assert!(matches!(stretched, Err(EngineError::LocationOccupied)), "{stretched:?}");
}

#[tokio::test]
async fn exclusion_constraint_reports_location_occupied() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 5, host).await;
    let events = event_service(&pool);

    let admitted = events
        .create_event(new_event(hall.id, next_week_at(17, 0), 3600, 1), host)
        .await
        .unwrap();

    // Written without the location lock or the overlap check.
    let now = Utc::now().naive_utc();
    let sneaky = Event {
        id: Uuid::new_v4(),
        name: unique_name(),
        start: admitted.start + Duration::minutes(30),
        finish: admitted.finish + Duration::minutes(30),
        created_at: now,
        modified_at: now,
        ..admitted.clone()
    };
    let mut tx = pool.begin().await.unwrap();
    let err = Event::insert(&mut *tx, &sneaky)
        .await
        .map_err(translate_schedule_conflict)
        .unwrap_err();
    assert!(matches!(err, EngineError::LocationOccupied), "{err:?}");
}

#[tokio::test]
async fn catalog_outage_fails_admission_closed() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 5, host).await;
    let events = event_service_with(&pool, Arc::new(DownGate));

    let refused = events
        .create_event(new_event(hall.id, next_week_at(11, 0), 1800, 1), host)
        .await;
    assert!(matches!(refused, Err(EngineError::ServiceUnavailable(_))), "{refused:?}");

    // Earlier checks still win over the outage.
    let too_many = events
        .create_event(new_event(hall.id, next_week_at(11, 0), 1800, 6), host)
        .await;
    assert!(matches!(too_many, Err(EngineError::InvalidParticipants { .. })));

    // Nothing was written: the slot is still free once the catalog answers.
    let admitted = event_service(&pool)
        .create_event(new_event(hall.id, next_week_at(11, 0), 1800, 1), host)
        .await
        .unwrap();
    assert_eq!(admitted.location_id, hall.id);
}

#[tokio::test]
async fn entitlement_is_asked_once_per_admission() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 5, host).await;
    let gate = Arc::new(CountingGate::default());
    let events = event_service_with(&pool, gate.clone());

    let event = events
        .create_event(new_event(hall.id, next_week_at(19, 0), 1800, 1), host)
        .await
        .unwrap();
    assert_eq!(gate.calls(), 1);

    events
        .edit_event(
            event.id,
            EventChanges {
                movie_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
            host,
        )
        .await
        .unwrap();
    assert_eq!(gate.calls(), 2);
}

#[tokio::test]
async fn far_future_start_is_invalid_input() {
    let Some(pool) = test_pool().await else { return };
    let host = Uuid::new_v4();
    let hall = location(&pool, 5, host).await;
    let events = event_service(&pool);

    let end_of_calendar = NaiveDate::from_ymd_opt(262_142, 12, 31)
        .unwrap()
        .and_hms_opt(23, 0, 0)
        .unwrap();
    let refused = events
        .create_event(new_event(hall.id, end_of_calendar, 7200, 1), host)
        .await;
    assert!(matches!(refused, Err(EngineError::InvalidInput(_))), "{refused:?}");
}
