use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::metronome::TimeSignature;

/// Beats per row; the 12-beat compás is shown as two rows of six.
fn row_width(cycle_length: u32) -> u32 {
    if cycle_length > 8 {
        cycle_length.div_ceil(2)
    } else {
        cycle_length
    }
}

fn beat_style(signature: TimeSignature, beat: u32, current: u32, running: bool) -> Style {
    if !running {
        return Style::default().bg(Color::DarkGray).fg(Color::Gray);
    }

    let is_current = beat == current;
    let strong = signature.is_strong(beat);
    let bg = match (strong, is_current) {
        (true, true) => Color::Red,
        (true, false) => Color::LightRed,
        (false, true) => Color::LightYellow,
        (false, false) => Color::DarkGray,
    };

    let style = Style::default().bg(bg).fg(Color::White);
    if is_current {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

/// One styled cell per beat of the cycle. Only the current beat shows its
/// number while running.
pub fn beat_lines(signature: TimeSignature, current_beat: u32, running: bool) -> Vec<Line<'static>> {
    let config = signature.config();
    let current = config.clamp_beat(current_beat);
    let width = row_width(config.cycle_length);

    let mut lines = Vec::new();
    let mut spans = Vec::new();
    for beat in 1..=config.cycle_length {
        let label = if running && beat == current {
            format!(" {:>2} ", beat)
        } else {
            "    ".to_string()
        };
        spans.push(Span::styled(label, beat_style(signature, beat, current, running)));
        spans.push(Span::raw(" "));

        if beat % width == 0 || beat == config.cycle_length {
            lines.push(Line::from(std::mem::take(&mut spans)));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(lines: &[Line<'_>]) -> usize {
        lines.iter().map(|line| line.spans.len() / 2).sum()
    }

    #[test]
    fn test_layout_per_signature() {
        let eight = beat_lines(TimeSignature::EightBeat, 1, true);
        assert_eq!(eight.len(), 1);
        assert_eq!(cells(&eight), 8);

        let flamenco = beat_lines(TimeSignature::Flamenco12, 3, true);
        assert_eq!(flamenco.len(), 2);
        assert_eq!(cells(&flamenco), 12);
    }

    #[test]
    fn test_only_current_beat_is_labelled() {
        let lines = beat_lines(TimeSignature::Flamenco12, 8, true);
        let labelled: Vec<String> = lines
            .iter()
            .flat_map(|line| line.spans.iter())
            .map(|span| span.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        assert_eq!(labelled, vec!["8".to_string()]);

        let stopped = beat_lines(TimeSignature::Flamenco12, 8, false);
        assert!(
            stopped
                .iter()
                .flat_map(|line| line.spans.iter())
                .all(|span| span.content.trim().is_empty())
        );
    }

    #[test]
    fn test_colours_follow_accents() {
        // Accents share a colour whatever the signature.
        let eight = beat_style(TimeSignature::EightBeat, 5, 1, true);
        let flamenco = beat_style(TimeSignature::Flamenco12, 6, 1, true);
        assert_eq!(eight.bg, Some(Color::LightRed));
        assert_eq!(eight, flamenco);

        let weak_current = beat_style(TimeSignature::Flamenco12, 5, 5, true);
        assert_eq!(weak_current.bg, Some(Color::LightYellow));
        assert_eq!(
            beat_style(TimeSignature::EightBeat, 2, 1, true).bg,
            Some(Color::DarkGray)
        );
    }

    #[test]
    fn test_out_of_range_beat_is_clamped() {
        let lines = beat_lines(TimeSignature::EightBeat, 11, true);
        let last_cell = &lines[0].spans[14];
        assert_eq!(last_cell.content.trim(), "8");
    }
}
