//! Program change rewriting.
//!
//! Each track is rebuilt into a fresh event list rather than patched in
//! place, so the "previous event" a note sees is always the last event
//! already emitted to the output.

use midly::num::{u28, u4, u7};
use midly::{MidiMessage, Smf, TrackEvent, TrackEventKind};
use std::fmt;
use std::str::FromStr;

/// When a synthetic program change is placed in front of a note event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertionPolicy {
    /// Once per channel per track, ahead of the channel's first note event,
    /// unless a program change for that channel was already seen.
    #[default]
    FirstNotePerChannel,
    /// Ahead of every note event whose immediate predecessor in the output
    /// is not a program change.
    EveryUnprefixedNote,
}

impl InsertionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstNotePerChannel => "first-note-per-channel",
            Self::EveryUnprefixedNote => "every-unprefixed-note",
        }
    }
}

impl fmt::Display for InsertionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsertionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-note-per-channel" => Ok(Self::FirstNotePerChannel),
            "every-unprefixed-note" => Ok(Self::EveryUnprefixedNote),
            other => Err(format!(
                "unknown insertion policy '{}' (expected first-note-per-channel or every-unprefixed-note)",
                other
            )),
        }
    }
}

/// Counts of what a rewrite pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub tracks: usize,
    /// Existing program changes whose program was replaced.
    pub overwritten: usize,
    /// Synthetic program changes added.
    pub inserted: usize,
}

enum Role {
    ProgramChange(u4),
    Note(u4),
    Other,
}

fn role(kind: &TrackEventKind<'_>) -> Role {
    match kind {
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange { .. },
        } => Role::ProgramChange(*channel),
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. },
        } => Role::Note(*channel),
        _ => Role::Other,
    }
}

fn program_change<'a>(delta: u28, channel: u4, program: u7) -> TrackEvent<'a> {
    TrackEvent {
        delta,
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange { program },
        },
    }
}

/// Rewrite every track of `smf` so all channels play `program`.
///
/// Tracks are processed independently and in their original order. The
/// header (format, timing) is carried over untouched.
pub fn rewrite<'a>(
    smf: &Smf<'a>,
    program: u7,
    policy: InsertionPolicy,
) -> (Smf<'a>, RewriteReport) {
    let mut report = RewriteReport {
        tracks: smf.tracks.len(),
        ..Default::default()
    };

    let tracks = smf
        .tracks
        .iter()
        .map(|track| rewrite_track(track, program, policy, &mut report))
        .collect();

    (
        Smf {
            header: smf.header,
            tracks,
        },
        report,
    )
}

/// Rewrite a single track, accumulating counts into `report`.
///
/// No event is dropped or reordered; the output is the input with program
/// changes corrected and zero-delta program changes spliced in.
pub fn rewrite_track<'a>(
    track: &[TrackEvent<'a>],
    program: u7,
    policy: InsertionPolicy,
    report: &mut RewriteReport,
) -> Vec<TrackEvent<'a>> {
    let mut out: Vec<TrackEvent<'a>> = Vec::with_capacity(track.len() + 16);
    let mut announced = [false; 16];

    for event in track {
        match role(&event.kind) {
            Role::ProgramChange(channel) => {
                out.push(program_change(event.delta, channel, program));
                announced[channel.as_int() as usize] = true;
                report.overwritten += 1;
            }
            Role::Note(channel) => {
                let slot = channel.as_int() as usize;
                let insert = match policy {
                    InsertionPolicy::FirstNotePerChannel => !announced[slot],
                    InsertionPolicy::EveryUnprefixedNote => !out
                        .last()
                        .is_some_and(|prev| matches!(role(&prev.kind), Role::ProgramChange(_))),
                };
                if insert {
                    out.push(program_change(u28::new(0), channel, program));
                    announced[slot] = true;
                    report.inserted += 1;
                }
                out.push(*event);
            }
            Role::Other => out.push(*event),
        }
    }

    out
}

/// Total elapsed ticks of a track (sum of deltas).
pub fn track_span(track: &[TrackEvent<'_>]) -> u64 {
    track.iter().map(|e| u64::from(e.delta.as_int())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, MetaMessage, Timing};
    use pretty_assertions::assert_eq;

    fn midi<'a>(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'a> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        }
    }

    fn on<'a>(delta: u32, channel: u8, key: u8) -> TrackEvent<'a> {
        midi(
            delta,
            channel,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(100),
            },
        )
    }

    fn off<'a>(delta: u32, channel: u8, key: u8) -> TrackEvent<'a> {
        midi(
            delta,
            channel,
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        )
    }

    fn pc<'a>(delta: u32, channel: u8, program: u8) -> TrackEvent<'a> {
        midi(
            delta,
            channel,
            MidiMessage::ProgramChange {
                program: u7::new(program),
            },
        )
    }

    fn tempo<'a>(delta: u32) -> TrackEvent<'a> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(midly::num::u24::new(500_000))),
        }
    }

    fn end<'a>(delta: u32) -> TrackEvent<'a> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    fn run(track: &[TrackEvent<'static>], policy: InsertionPolicy) -> (Vec<TrackEvent<'static>>, RewriteReport) {
        let mut report = RewriteReport::default();
        let out = rewrite_track(track, u7::new(4), policy, &mut report);
        (out, report)
    }

    #[test]
    fn single_note_pair_gets_one_program_change() {
        let track = vec![on(0, 0, 60), off(480, 0, 60), end(0)];
        let (out, report) = run(&track, InsertionPolicy::FirstNotePerChannel);

        assert_eq!(out, vec![pc(0, 0, 4), on(0, 0, 60), off(480, 0, 60), end(0)]);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.overwritten, 0);
    }

    #[test]
    fn existing_program_change_is_overwritten_in_place() {
        let track = vec![tempo(0), pc(10, 3, 71), on(5, 3, 64), off(240, 3, 64), end(0)];
        let (out, report) = run(&track, InsertionPolicy::FirstNotePerChannel);

        assert_eq!(
            out,
            vec![tempo(0), pc(10, 3, 4), on(5, 3, 64), off(240, 3, 64), end(0)]
        );
        assert_eq!(report.overwritten, 1);
        assert_eq!(report.inserted, 0);
    }

    #[test]
    fn each_channel_is_announced_once() {
        let track = vec![
            on(0, 0, 60),
            on(0, 1, 48),
            off(480, 0, 60),
            off(0, 1, 48),
            on(0, 0, 62),
            off(480, 0, 62),
            end(0),
        ];
        let (out, report) = run(&track, InsertionPolicy::FirstNotePerChannel);

        assert_eq!(
            out,
            vec![
                pc(0, 0, 4),
                on(0, 0, 60),
                pc(0, 1, 4),
                on(0, 1, 48),
                off(480, 0, 60),
                off(0, 1, 48),
                on(0, 0, 62),
                off(480, 0, 62),
                end(0),
            ]
        );
        assert_eq!(report.inserted, 2);
    }

    #[test]
    fn every_unprefixed_note_policy_prefixes_each_note() {
        let track = vec![on(0, 0, 60), off(480, 0, 60), end(0)];
        let (out, report) = run(&track, InsertionPolicy::EveryUnprefixedNote);

        assert_eq!(
            out,
            vec![pc(0, 0, 4), on(0, 0, 60), pc(0, 0, 4), off(480, 0, 60), end(0)]
        );
        assert_eq!(report.inserted, 2);
    }

    #[test]
    fn every_unprefixed_note_policy_respects_existing_prefix() {
        let track = vec![pc(0, 2, 0), on(0, 2, 60), tempo(0), off(480, 2, 60)];
        let (out, report) = run(&track, InsertionPolicy::EveryUnprefixedNote);

        assert_eq!(
            out,
            vec![pc(0, 2, 4), on(0, 2, 60), tempo(0), pc(0, 2, 4), off(480, 2, 60)]
        );
        assert_eq!(report.inserted, 1);
        assert_eq!(report.overwritten, 1);
    }

    #[test]
    fn span_is_preserved() {
        let track = vec![
            tempo(0),
            on(96, 0, 60),
            on(0, 5, 40),
            off(480, 0, 60),
            off(17, 5, 40),
            end(3),
        ];
        for policy in [InsertionPolicy::FirstNotePerChannel, InsertionPolicy::EveryUnprefixedNote] {
            let (out, _) = run(&track, policy);
            assert_eq!(track_span(&out), track_span(&track));
            assert_eq!(track_span(&out), 596);
        }
    }

    #[test]
    fn rewrite_is_a_fixed_point() {
        let track = vec![on(0, 0, 60), off(480, 0, 60), on(0, 9, 36), off(120, 9, 36), end(0)];
        for policy in [InsertionPolicy::FirstNotePerChannel, InsertionPolicy::EveryUnprefixedNote] {
            let (once, _) = run(&track, policy);
            let (twice, report) = run(&once, policy);
            assert_eq!(twice, once);
            assert_eq!(report.inserted, 0);
        }
    }

    #[test]
    fn tracks_are_independent() {
        let smf = Smf {
            header: Header::new(Format::Parallel, Timing::Metrical(midly::num::u15::new(480))),
            tracks: vec![
                vec![pc(0, 0, 10), on(0, 0, 60), off(480, 0, 60), end(0)],
                vec![on(0, 0, 67), off(480, 0, 67), end(0)],
            ],
        };

        let (out, report) = rewrite(&smf, u7::new(4), InsertionPolicy::FirstNotePerChannel);

        assert_eq!(out.header, smf.header);
        assert_eq!(out.tracks[0], vec![pc(0, 0, 4), on(0, 0, 60), off(480, 0, 60), end(0)]);
        assert_eq!(
            out.tracks[1],
            vec![pc(0, 0, 4), on(0, 0, 67), off(480, 0, 67), end(0)]
        );
        assert_eq!(
            report,
            RewriteReport {
                tracks: 2,
                overwritten: 1,
                inserted: 1,
            }
        );
    }

    #[test]
    fn track_without_notes_is_untouched() {
        let track = vec![tempo(0), end(1920)];
        let (out, report) = run(&track, InsertionPolicy::FirstNotePerChannel);
        assert_eq!(out, track);
        assert_eq!(report, RewriteReport::default());
    }

    #[test]
    fn policy_parses_from_kebab_case() {
        assert_eq!(
            "every-unprefixed-note".parse::<InsertionPolicy>(),
            Ok(InsertionPolicy::EveryUnprefixedNote)
        );
        assert_eq!(
            InsertionPolicy::FirstNotePerChannel.to_string(),
            "first-note-per-channel"
        );
        assert!("sometimes".parse::<InsertionPolicy>().is_err());
    }
}
