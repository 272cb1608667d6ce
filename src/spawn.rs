// Spawn-timer reconstruction.
//
// A spawnpoint's row carries sparse evidence about its recurring
// appearance window: the latest second-of-hour it was seen occupied,
// the earliest second-of-hour it was confirmed empty, and a four-slot
// quarter-hour presence string. This module infers the appear and
// disappear seconds-of-hour from that evidence. The arithmetic is a
// known heuristic and downstream renderers depend on bit-for-bit
// compatible windows, so the exact modulo behavior matters.

/// Seconds per observation slot (quarter hour).
const SLOT_SECS: i64 = 900;
/// Seconds per spawn cycle.
const HOUR_SECS: i64 = 3600;

/// One quarter-hour observation bucket decoded from the stored
/// per-character encoding (`+` present, `-` absent, `?` unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSlot {
    Present,
    Absent,
    Unknown,
}

/// Decode the stored links string. The encoding is an external data
/// contract; anything unrecognized reads as Unknown.
pub fn decode_links(links: &str) -> Vec<ObservationSlot> {
    links
        .chars()
        .map(|c| match c {
            '+' => ObservationSlot::Present,
            '-' => ObservationSlot::Absent,
            _ => ObservationSlot::Unknown,
        })
        .collect()
}

/// The raw evidence needed to reconstruct one spawnpoint's window.
#[derive(Debug, Clone)]
pub struct SpawnObservation<'a> {
    pub earliest_unseen: i64,
    pub latest_seen: i64,
    pub links: &'a str,
    pub done: bool,
}

/// A reconstructed appear/disappear window, in seconds of the hour.
/// Derived fresh per query; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnTimer {
    pub appear: u32,
    pub disappear: u32,
    pub uncertain: bool,
}

/// True when the window's end boundary is precisely known from
/// observation: the latest-seen and earliest-unseen marks coincide
/// within the hour.
pub fn tth_found(earliest_unseen: i64, latest_seen: i64) -> bool {
    latest_seen.rem_euclid(HOUR_SECS) == earliest_unseen.rem_euclid(HOUR_SECS)
}

/// Reconstruct the spawn window from one observation row.
///
/// `spawn_delay` shifts the appear boundary (deployments that know
/// their scanner lag configure it; default 0). `links_override`
/// substitutes the slot string and suppresses the no-TTH fudge, for
/// callers re-running the scan against hypothetical evidence.
pub fn reconstruct(
    obs: &SpawnObservation<'_>,
    spawn_delay: i64,
    links_override: Option<&str>,
) -> SpawnTimer {
    let mut slots = decode_links(links_override.unwrap_or(obs.links));

    // The last slot is a sentinel and must read absent before any
    // index scan, both before and after the unknown substitution.
    if !slots.contains(&ObservationSlot::Absent) {
        force_last_absent(&mut slots);
    }
    for slot in &mut slots {
        if *slot == ObservationSlot::Unknown {
            *slot = ObservationSlot::Present;
        }
    }
    force_last_absent(&mut slots);

    let pivot = slots
        .iter()
        .position(|s| *s == ObservationSlot::Present)
        .or_else(|| slots.iter().position(|s| *s == ObservationSlot::Absent))
        .unwrap_or(0) as i64;

    let appear =
        (obs.earliest_unseen - (4 - pivot) * SLOT_SECS + spawn_delay).rem_euclid(HOUR_SECS);

    let tth = tth_found(obs.earliest_unseen, obs.latest_seen);
    let no_tth_adjust = if !tth && links_override.is_none() {
        60
    } else {
        0
    };

    let last_absent = slots
        .iter()
        .rposition(|s| *s == ObservationSlot::Absent)
        .unwrap_or(0) as i64;
    let disappear =
        (obs.latest_seen - (3 - last_absent) * SLOT_SECS + no_tth_adjust).rem_euclid(HOUR_SECS);

    SpawnTimer {
        appear: appear as u32,
        disappear: disappear as u32,
        uncertain: !tth || !obs.done,
    }
}

fn force_last_absent(slots: &mut Vec<ObservationSlot>) {
    if let Some(last) = slots.last_mut() {
        *last = ObservationSlot::Absent;
    } else {
        slots.push(ObservationSlot::Absent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_maps_markers() {
        assert_eq!(
            decode_links("+-?x"),
            vec![
                ObservationSlot::Present,
                ObservationSlot::Absent,
                ObservationSlot::Unknown,
                ObservationSlot::Unknown,
            ]
        );
    }

    // Regression fixture, values derived once from the documented
    // arithmetic: links "++++" forces the sentinel to "+++-", pivot 0,
    // appear = (900 - 4*900) mod 3600 = 900; latest 2700 != earliest
    // 900 within the hour so the end is estimated with the +60 fudge:
    // disappear = (2700 - 0*900 + 60) mod 3600 = 2760.
    #[test]
    fn reconstructs_estimated_window() {
        let obs = SpawnObservation {
            earliest_unseen: 900,
            latest_seen: 2700,
            links: "++++",
            done: true,
        };
        let timer = reconstruct(&obs, 0, None);
        assert_eq!(timer.appear, 900);
        assert_eq!(timer.disappear, 2760);
        assert!(timer.uncertain, "estimated end must flag uncertainty");
    }

    // When the latest-seen and earliest-unseen marks coincide the end
    // boundary is exact: no fudge, not uncertain.
    #[test]
    fn reconstructs_exact_window() {
        let obs = SpawnObservation {
            earliest_unseen: 2700,
            latest_seen: 2700,
            links: "++++",
            done: true,
        };
        let timer = reconstruct(&obs, 0, None);
        assert!(tth_found(obs.earliest_unseen, obs.latest_seen));
        assert_eq!(timer.appear, 2700);
        assert_eq!(timer.disappear, 2700);
        assert!(!timer.uncertain);
    }

    #[test]
    fn undone_scan_is_uncertain_even_with_exact_end() {
        let obs = SpawnObservation {
            earliest_unseen: 2700,
            latest_seen: 2700,
            links: "++++",
            done: false,
        };
        assert!(reconstruct(&obs, 0, None).uncertain);
    }

    #[test]
    fn markerless_links_never_panic() {
        // Zero '-' characters: the trailing sentinel is forced before
        // any index scan.
        let obs = SpawnObservation {
            earliest_unseen: 1800,
            latest_seen: 1800,
            links: "????",
            done: true,
        };
        let timer = reconstruct(&obs, 0, None);
        // "????" -> "???-" -> "+++-": pivot 0, last absent 3.
        assert_eq!(timer.appear, (1800i64 - 3600).rem_euclid(3600) as u32);
        assert_eq!(timer.disappear, 1800);
    }

    #[test]
    fn empty_links_never_panic() {
        let obs = SpawnObservation {
            earliest_unseen: 0,
            latest_seen: 0,
            links: "",
            done: false,
        };
        let timer = reconstruct(&obs, 0, None);
        assert!(timer.uncertain);
        // Single forced sentinel: pivot 0, last absent 0.
        assert_eq!(timer.appear, (0i64 - 4 * 900).rem_euclid(3600) as u32);
        assert_eq!(timer.disappear, (0i64 - 3 * 900).rem_euclid(3600) as u32);
    }

    #[test]
    fn unknown_slots_count_as_present_for_pivot() {
        let obs = SpawnObservation {
            earliest_unseen: 900,
            latest_seen: 900,
            links: "?-++",
            done: true,
        };
        // '?' becomes '+', so the pivot is slot 0, not slot 2.
        let timer = reconstruct(&obs, 0, None);
        assert_eq!(timer.appear, (900i64 - 4 * 900).rem_euclid(3600) as u32);
    }

    #[test]
    fn links_override_suppresses_no_tth_fudge() {
        let obs = SpawnObservation {
            earliest_unseen: 900,
            latest_seen: 2700,
            links: "++++",
            done: true,
        };
        let with_override = reconstruct(&obs, 0, Some("++++"));
        // Same slots, but the override disables the +60 adjustment.
        assert_eq!(with_override.disappear, 2700);
    }

    #[test]
    fn spawn_delay_shifts_appear() {
        let obs = SpawnObservation {
            earliest_unseen: 900,
            latest_seen: 2700,
            links: "++++",
            done: true,
        };
        let timer = reconstruct(&obs, 30, None);
        assert_eq!(timer.appear, 930);
    }

    #[test]
    fn modulo_is_non_negative() {
        let obs = SpawnObservation {
            earliest_unseen: 100,
            latest_seen: 100,
            links: "-+++",
            done: true,
        };
        let timer = reconstruct(&obs, 0, None);
        // appear = (100 - (4-1)*900) mod 3600 must wrap positive.
        assert_eq!(timer.appear, (100i64 - 2700).rem_euclid(3600) as u32);
        assert!(timer.appear < 3600);
    }
}
