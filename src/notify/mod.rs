use crate::broadcast::Broadcaster;
use crate::events::ServerEvent;
use crate::pet::{Pet, StatKind, StatVector};
use crate::presence::PresenceRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// A stat at or below this value after a crossing is worth a warning
pub const WARNING_THRESHOLD: u8 = 50;
/// A stat at or below this value after a crossing is an emergency
pub const CRITICAL_THRESHOLD: u8 = 25;

/// Upper bound on remembered (pet, message) pairs in the dedup guard
const DEDUP_RING_CAPACITY: usize = 64;

/// Notification severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// One dimension that crossed a threshold, with its value after the step
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TriggeredStat {
    pub name: StatKind,
    pub value: u8,
}

/// An alert produced by a threshold crossing.
///
/// Created here, handed to the broadcaster, never mutated afterwards.
/// Read state is the client's business.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub pet_id: Uuid,
    pub pet_name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub stats: Vec<TriggeredStat>,
    pub created_at: DateTime<Utc>,
}

/// Edge-triggered crossing: the stat was above the threshold before the step
/// and is at or below it after. Already-low stats do not re-trigger;
/// recovering above the threshold re-arms it.
fn crossed(old: u8, new: u8, threshold: u8) -> bool {
    old > threshold && new <= threshold
}

/// Turns stat deltas into at most one prioritized notification per step.
///
/// Critical crossings pre-empt warnings: if any dimension crossed the
/// critical threshold this step, the notification is critical and lists only
/// those dimensions, even when others crossed warning at the same time.
pub struct ThresholdNotifier {
    dedup_window: Duration,
    /// Recently emitted (pet, message) pairs, oldest first, purged lazily
    recent: Mutex<VecDeque<(Uuid, String, Instant)>>,
}

impl ThresholdNotifier {
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            dedup_window,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Evaluate one stat step for a pet.
    ///
    /// Returns at most one notification; `None` when nothing crossed or when
    /// an identical notification was emitted within the dedup window.
    pub fn evaluate(
        &self,
        pet_name: &str,
        pet_id: Uuid,
        old: &StatVector,
        new: &StatVector,
    ) -> Option<Notification> {
        let mut critical = Vec::new();
        let mut warning = Vec::new();

        for kind in StatKind::ALL {
            let (before, after) = (old.get(kind), new.get(kind));
            if crossed(before, after, CRITICAL_THRESHOLD) {
                critical.push(TriggeredStat {
                    name: kind,
                    value: after,
                });
            } else if crossed(before, after, WARNING_THRESHOLD) {
                warning.push(TriggeredStat {
                    name: kind,
                    value: after,
                });
            }
        }

        let notification = if !critical.is_empty() {
            Notification {
                level: AlertLevel::Critical,
                title: format!("{} in DANGER!", pet_name),
                message: format!("Critical stats: {}", stat_list(&critical)),
                pet_id,
                pet_name: pet_name.to_string(),
                kind: "stat_critical",
                stats: critical,
                created_at: Utc::now(),
            }
        } else if !warning.is_empty() {
            Notification {
                level: AlertLevel::Warning,
                title: format!("{} needs attention", pet_name),
                message: format!("Low stats: {}", stat_list(&warning)),
                pet_id,
                pet_name: pet_name.to_string(),
                kind: "stat_warning",
                stats: warning,
                created_at: Utc::now(),
            }
        } else {
            return None;
        };

        if self.recently_emitted(pet_id, &notification.message) {
            debug!(
                pet_id = %pet_id,
                message = %notification.message,
                "duplicate notification suppressed"
            );
            return None;
        }

        Some(notification)
    }

    /// Check the dedup ring and record the candidate if it is fresh.
    fn recently_emitted(&self, pet_id: Uuid, message: &str) -> bool {
        let mut recent = self.recent.lock().unwrap();

        // Entries are pushed in time order, so expired ones sit at the front
        while let Some((_, _, at)) = recent.front() {
            if at.elapsed() > self.dedup_window {
                recent.pop_front();
            } else {
                break;
            }
        }

        if recent
            .iter()
            .any(|(id, msg, _)| *id == pet_id && msg == message)
        {
            return true;
        }

        if recent.len() == DEDUP_RING_CAPACITY {
            recent.pop_front();
        }
        recent.push_back((pet_id, message.to_string(), Instant::now()));
        false
    }
}

fn stat_list(stats: &[TriggeredStat]) -> String {
    stats
        .iter()
        .map(|s| format!("{} ({}%)", s.name.label(), s.value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Forward one stat step to the pet's owner: a `pet:updated` event, plus a
/// `notification:new` when a threshold was crossed.
///
/// Shared by the tick cycle and owner actions so the clamp-and-notify
/// discipline stays in one place. Unnamed pets and pets whose owner is not
/// connected produce nothing.
pub fn dispatch_stat_change(
    notifier: &ThresholdNotifier,
    presence: &PresenceRegistry,
    broadcaster: &Broadcaster,
    pet: &Pet,
    old: StatVector,
    new: StatVector,
) {
    let Some(name) = pet.name.as_deref() else {
        return;
    };
    let Some(owner) = pet.owner.as_deref() else {
        return;
    };
    let Some(session_id) = presence.session_for_user(owner) else {
        return;
    };

    broadcaster.to_session(
        session_id,
        ServerEvent::PetUpdated {
            pet_id: pet.id,
            stats: new,
        },
    );

    if let Some(notification) = notifier.evaluate(name, pet.id, &old, &new) {
        broadcaster.to_session(session_id, ServerEvent::NotificationNew(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> ThresholdNotifier {
        ThresholdNotifier::new(Duration::from_secs(2))
    }

    fn stats(hunger: u8, hygiene: u8, energy: u8, fun: u8) -> StatVector {
        StatVector {
            hunger,
            hygiene,
            energy,
            fun,
        }
    }

    #[test]
    fn warning_crossing_emits_one_warning() {
        let n = notifier();
        let old = stats(60, 100, 100, 100);
        let new = stats(40, 100, 100, 100);

        let notification = n.evaluate("Momo", Uuid::new_v4(), &old, &new).unwrap();
        assert_eq!(notification.level, AlertLevel::Warning);
        assert_eq!(notification.kind, "stat_warning");
        assert_eq!(notification.stats.len(), 1);
        assert_eq!(notification.stats[0].name, StatKind::Hunger);
        assert_eq!(notification.stats[0].value, 40);
        assert_eq!(notification.message, "Low stats: Hunger (40%)");
        assert_eq!(notification.title, "Momo needs attention");
    }

    #[test]
    fn critical_crossing_emits_one_critical_and_no_warning() {
        let n = notifier();
        let old = stats(60, 100, 100, 100);
        let new = stats(20, 100, 100, 100);

        let notification = n.evaluate("Momo", Uuid::new_v4(), &old, &new).unwrap();
        assert_eq!(notification.level, AlertLevel::Critical);
        assert_eq!(notification.kind, "stat_critical");
        assert_eq!(notification.stats.len(), 1);
        assert_eq!(notification.message, "Critical stats: Hunger (20%)");
        assert_eq!(notification.title, "Momo in DANGER!");
    }

    #[test]
    fn already_below_threshold_does_not_retrigger() {
        let n = notifier();
        let old = stats(20, 100, 100, 100);
        let new = stats(10, 100, 100, 100);

        assert!(n.evaluate("Momo", Uuid::new_v4(), &old, &new).is_none());
    }

    #[test]
    fn recovery_rearms_the_trigger() {
        let n = notifier();
        let pet_id = Uuid::new_v4();

        // Drop below warning
        assert!(n
            .evaluate("Momo", pet_id, &stats(60, 100, 100, 100), &stats(45, 100, 100, 100))
            .is_some());
        // Recover above, then drop again: fires again (different value, new message)
        assert!(n
            .evaluate("Momo", pet_id, &stats(80, 100, 100, 100), &stats(40, 100, 100, 100))
            .is_some());
    }

    #[test]
    fn critical_preempts_simultaneous_warning_crossing() {
        let n = notifier();
        let old = stats(60, 60, 100, 100);
        let new = stats(20, 40, 100, 100);

        let notification = n.evaluate("Momo", Uuid::new_v4(), &old, &new).unwrap();
        assert_eq!(notification.level, AlertLevel::Critical);
        // Hygiene's warning-level crossing is suppressed for this step
        assert_eq!(notification.stats.len(), 1);
        assert_eq!(notification.stats[0].name, StatKind::Hunger);
    }

    #[test]
    fn multiple_critical_crossings_grouped_into_one() {
        let n = notifier();
        let old = stats(60, 100, 100, 30);
        let new = stats(20, 100, 100, 10);

        let notification = n.evaluate("Momo", Uuid::new_v4(), &old, &new).unwrap();
        assert_eq!(notification.level, AlertLevel::Critical);
        assert_eq!(notification.stats.len(), 2);
        assert_eq!(
            notification.message,
            "Critical stats: Hunger (20%), Fun (10%)"
        );
    }

    #[test]
    fn no_crossing_no_notification() {
        let n = notifier();
        let old = stats(100, 100, 100, 100);
        let new = stats(80, 90, 100, 95);

        assert!(n.evaluate("Momo", Uuid::new_v4(), &old, &new).is_none());
    }

    #[test]
    fn energy_crossing_is_reported_like_any_other_dimension() {
        let n = notifier();
        let old = stats(100, 100, 60, 100);
        let new = stats(100, 100, 40, 100);

        let notification = n.evaluate("Momo", Uuid::new_v4(), &old, &new).unwrap();
        assert_eq!(notification.stats[0].name, StatKind::Energy);
    }

    #[test]
    fn identical_notification_within_window_is_suppressed() {
        let n = notifier();
        let pet_id = Uuid::new_v4();
        let old = stats(60, 100, 100, 100);
        let new = stats(40, 100, 100, 100);

        assert!(n.evaluate("Momo", pet_id, &old, &new).is_some());
        // Same step delivered again through a second call path
        assert!(n.evaluate("Momo", pet_id, &old, &new).is_none());
    }

    #[test]
    fn dedup_is_keyed_per_pet() {
        let n = notifier();
        let old = stats(60, 100, 100, 100);
        let new = stats(40, 100, 100, 100);

        assert!(n.evaluate("Momo", Uuid::new_v4(), &old, &new).is_some());
        // Same message for a different pet still goes out
        assert!(n.evaluate("Momo", Uuid::new_v4(), &old, &new).is_some());
    }

    #[test]
    fn dedup_expires_after_window() {
        let n = ThresholdNotifier::new(Duration::from_millis(10));
        let pet_id = Uuid::new_v4();
        let old = stats(60, 100, 100, 100);
        let new = stats(40, 100, 100, 100);

        assert!(n.evaluate("Momo", pet_id, &old, &new).is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(n.evaluate("Momo", pet_id, &old, &new).is_some());
    }

    #[test]
    fn dedup_ring_is_bounded() {
        let n = ThresholdNotifier::new(Duration::from_secs(3600));
        let old = stats(60, 100, 100, 100);
        let new = stats(40, 100, 100, 100);

        for _ in 0..(DEDUP_RING_CAPACITY * 2) {
            n.evaluate("Momo", Uuid::new_v4(), &old, &new);
        }
        assert!(n.recent.lock().unwrap().len() <= DEDUP_RING_CAPACITY);
    }
}
