use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::TimeWindow;

/// Takes the first `participants` seats in the given order.
pub fn select_seats(vacant: &[Uuid], participants: i32) -> Result<Vec<Uuid>, EngineError> {
    let wanted = usize::try_from(participants).unwrap_or(0);
    if vacant.len() < wanted {
        return Err(EngineError::InsufficientSeats {
            requested: participants,
            vacant: i32::try_from(vacant.len()).unwrap_or(i32::MAX),
        });
    }
    Ok(vacant[..wanted].to_vec())
}

/// Seats of the location that nobody holds during `window`, in row-major order.
/// With `for_event` set, seats already held in that event are not vacant either,
/// while its old time slot is ignored.
pub async fn vacant_seats(
    conn: &mut PgConnection,
    location_id: Uuid,
    window: TimeWindow,
    for_event: Option<Uuid>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT s.id FROM seat s
        WHERE s.location_id = $1
          AND NOT EXISTS (
              SELECT 1 FROM booking b
              JOIN event e ON e.id = b.event_id
              WHERE b.seat_id = s.id
                AND b.status <> 'EMPTY'
                AND (
                    e.id = $4
                    OR (e.start < $3 AND $2 < e.finish AND ($4::uuid IS NULL OR e.id <> $4))
                )
          )
        ORDER BY s.row NULLS LAST, s.number NULLS LAST, s.id
        "#
    )
    .bind(location_id)
    .bind(window.start)
    .bind(window.finish)
    .bind(for_event)
    .fetch_all(conn)
    .await
}

/// Picks the seats a host gets for their own party. Runs inside the admission
/// transaction, so vacancy is read under the same location lock as the overlap check.
pub async fn allocate(
    conn: &mut PgConnection,
    location_id: Uuid,
    window: TimeWindow,
    participants: i32,
    for_event: Option<Uuid>,
) -> Result<Vec<Uuid>, EngineError> {
    let vacant = vacant_seats(conn, location_id, window, for_event).await?;
    select_seats(&vacant, participants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn exactly_enough_seats_is_fine() {
        let seats = pool(50);
        let chosen = select_seats(&seats, 50).unwrap();
        assert_eq!(chosen, seats);
    }

    #[test]
    fn one_seat_short_is_insufficient() {
        let seats = pool(49);
        assert!(matches!(
            select_seats(&seats, 50),
            Err(EngineError::InsufficientSeats { requested: 50, vacant: 49 })
        ));
    }

    #[test]
    fn selection_keeps_row_major_order() {
        let seats = pool(10);
        assert_eq!(select_seats(&seats, 3).unwrap(), seats[..3].to_vec());
    }

    proptest! {
        #[test]
        fn selection_is_a_distinct_prefix(total in 0usize..200, wanted in 0i32..250) {
            let seats = pool(total);
            match select_seats(&seats, wanted) {
                Ok(chosen) => {
                    prop_assert_eq!(chosen.len(), wanted as usize);
                    prop_assert_eq!(&chosen[..], &seats[..wanted as usize]);
                }
                Err(EngineError::InsufficientSeats { requested, vacant }) => {
                    prop_assert!(wanted as usize > total);
                    prop_assert_eq!(requested, wanted);
                    prop_assert_eq!(vacant as usize, total);
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }
    }
}
