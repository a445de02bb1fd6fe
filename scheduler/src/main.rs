//! CLI demo for the flight-training slot scheduler.
//!
//! Walks the full booking lifecycle against a running service instance:
//! availability, a confirmed booking, view queries, cancellation, and a
//! conditions rejection.

use airslot_core::environment::SystemClock;
use chrono::{Duration, Utc};
use scheduler::{
    BookingId, Config, ForecastConditions, Participant, ParticipantId, ParticipantType,
    SchedulerApp, SchedulerError, SlotId, slot_key_for,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

async fn wait_for_view(app: &SchedulerApp, participant_id: &ParticipantId, status: &str) {
    for _ in 0..100 {
        if !app
            .slots_by_participant_and_status(participant_id, status)
            .is_empty()
        {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    println!("=== Flight-Training Slot Scheduler ===\n");

    let app = SchedulerApp::start(
        &config,
        Arc::new(SystemClock),
        Arc::new(ForecastConditions),
    )
    .await;

    // A slot comfortably in the future (bookings for past slots are
    // rejected).
    let slot_id = slot_key_for(Utc::now() + Duration::days(2));
    let student = Participant::new("s1", ParticipantType::Student);
    let aircraft = Participant::new("a1", ParticipantType::Aircraft);
    let instructor = Participant::new("i1", ParticipantType::Instructor);

    println!("Marking participants available for slot {slot_id}...");
    for participant in [student.clone(), aircraft.clone(), instructor.clone()] {
        app.mark_available(slot_id.clone(), participant).await?;
    }

    let booking_id = BookingId::new(Uuid::new_v4().to_string());
    println!("Booking slot {slot_id} as {booking_id}...");
    app.book_reservation(
        slot_id.clone(),
        student.id.clone(),
        aircraft.id.clone(),
        instructor.id.clone(),
        booking_id.clone(),
    )
    .await?;

    let slot = app.get_slot(&slot_id).await?;
    println!(
        "\nSlot state: {} available, {} booking(s)",
        slot.available.len(),
        slot.bookings.len()
    );

    wait_for_view(&app, &student.id, "booked").await;
    println!("\nView rows for {}:", student.id);
    for row in app.slots_by_participant(&student.id) {
        println!(
            "  {} {} {} booking={}",
            row.slot_id,
            row.participant_type,
            row.status,
            row.booking_id.as_ref().map_or("-", BookingId::as_str),
        );
    }

    println!("\nCanceling booking {booking_id}...");
    app.cancel_booking(slot_id.clone(), booking_id).await?;

    // The participants were consumed by the booking and are not
    // re-marked by cancellation, so a fresh booking must fail.
    let rebook = app
        .book_reservation(
            slot_id.clone(),
            student.id.clone(),
            aircraft.id.clone(),
            instructor.id.clone(),
            BookingId::new(Uuid::new_v4().to_string()),
        )
        .await;
    match rebook {
        Err(SchedulerError::NotBookable(slot)) => {
            println!("Re-booking failed as expected: slot {slot} is not bookable");
        }
        other => println!("Unexpected re-booking outcome: {other:?}"),
    }

    // Slots on the 13th forecast thunderstorms; the conditions check
    // grounds them.
    let unlucky = SlotId::new(format!(
        "{}-13-10",
        (Utc::now() + Duration::days(40)).format("%Y-%m")
    ));
    app.mark_available(unlucky.clone(), student.clone()).await?;
    app.mark_available(unlucky.clone(), aircraft.clone()).await?;
    app.mark_available(unlucky.clone(), instructor.clone())
        .await?;
    match app
        .book_reservation(
            unlucky.clone(),
            student.id.clone(),
            aircraft.id.clone(),
            instructor.id.clone(),
            BookingId::new(Uuid::new_v4().to_string()),
        )
        .await
    {
        Err(SchedulerError::ConditionsNotMet(slot)) => {
            println!("\nBooking for {slot} grounded by flight conditions, as forecast");
        }
        other => println!("\nUnexpected outcome for unlucky slot: {other:?}"),
    }

    app.shutdown().await;
    println!("\n=== Demo complete ===");
    Ok(())
}
