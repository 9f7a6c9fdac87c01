//! Finds the traffic cameras near an event venue.
//!
//! Brute force over every camera; fine for a few thousand cameras per
//! city. A spatial index would only pay off well beyond that.

use citypulse_events_models::{AffectedCamera, CameraRef, EventCameraMapping, ExternalEvent};

/// Cameras within `radius_km` of the venue, nearest first (ties by id).
/// Cameras with invalid coordinates are skipped.
#[must_use]
pub fn map_cameras(event: &ExternalEvent, cameras: &[CameraRef], radius_km: f64) -> EventCameraMapping {
    let venue = event.venue.location;
    let mut affected: Vec<AffectedCamera> = cameras
        .iter()
        .filter(|camera| camera.location.is_valid())
        .filter_map(|camera| {
            let distance_km = venue.distance_km(&camera.location);
            (distance_km <= radius_km).then(|| AffectedCamera {
                camera: camera.clone(),
                distance_km,
            })
        })
        .collect();

    affected.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.camera.id.cmp(&b.camera.id))
    });

    log::debug!(
        "{}: {} of {} cameras within {radius_km} km",
        event.id,
        affected.len(),
        cameras.len()
    );

    EventCameraMapping {
        event_id: event.id.clone(),
        affected_cameras: affected,
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use citypulse_events_models::{EventCategory, EventSource, Venue};
    use citypulse_spatial::Location;

    use super::*;

    fn event() -> ExternalEvent {
        ExternalEvent {
            id: "tm:1".to_string(),
            name: "Derby".to_string(),
            source: EventSource::Ticketing,
            category: EventCategory::Sports,
            venue: Venue {
                name: "Thong Nhat Stadium".to_string(),
                address: None,
                location: Location::new(10.7603, 106.6633),
            },
            start_time: DateTime::from_timestamp(1_740_830_400, 0).unwrap(),
            end_time: None,
            expected_attendees: 30_000,
        }
    }

    fn camera(id: &str, lat: f64, lng: f64) -> CameraRef {
        CameraRef {
            id: id.to_string(),
            location: Location::new(lat, lng),
            street: None,
        }
    }

    #[test]
    fn keeps_nearby_cameras_sorted_by_distance() {
        let cameras = vec![
            camera("far", 10.8231, 106.6297),
            camera("mid", 10.7680, 106.6633),
            camera("near", 10.7610, 106.6640),
            camera("broken", f64::NAN, 106.6),
            camera("same-spot-b", 10.7650, 106.6633),
            camera("same-spot-a", 10.7650, 106.6633),
        ];
        let mapping = map_cameras(&event(), &cameras, 2.0);
        let ids: Vec<_> = mapping
            .affected_cameras
            .iter()
            .map(|a| a.camera.id.as_str())
            .collect();
        assert_eq!(ids, ["near", "same-spot-a", "same-spot-b", "mid"]);
        assert_eq!(mapping.event_id, "tm:1");
    }

    #[test]
    fn distances_are_sorted_and_within_radius() {
        let cameras: Vec<_> = (0..40)
            .map(|i| {
                let offset = f64::from(i) * 0.002;
                camera(&format!("c{i}"), 10.7603 + offset, 106.6633 - offset / 2.0)
            })
            .collect();
        let radius = 3.0;
        let mapping = map_cameras(&event(), &cameras, radius);
        assert!(!mapping.affected_cameras.is_empty());
        for pair in mapping.affected_cameras.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
        assert!(mapping.affected_cameras.iter().all(|a| a.distance_km <= radius));
        assert!(mapping.affected_cameras.len() < cameras.len());
    }

    #[test]
    fn no_cameras_no_mapping() {
        assert!(map_cameras(&event(), &[], 2.0).affected_cameras.is_empty());
    }
}
