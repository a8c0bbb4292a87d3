//! The geometric join engine: spans → lines → paragraphs → reading order.
//!
//! Both join passes follow the same shape: seed a `Vec<Option<_>>` with
//! singleton containers, repeatedly absorb the nearest compatible neighbor
//! into the current container (nulling the absorbed slot, and re-examining
//! the current slot when the absorbed one had not had its own turn yet), and
//! compact the survivors at the end. Nothing holds an index across an
//! absorption, so membership can change freely while iterating.

use crate::geom::Point;
use crate::model::{Glyph, Line, Paragraph, Span};
use std::cmp::Ordering;

/// Alignment tolerance between a line's angle and the direction from its
/// last glyph to a candidate's first glyph, in degrees.
const ANGLE_TOLERANCE_DEG: f64 = 1.0;

/// Fraction of the average per-glyph advance beyond which a gap between two
/// joined spans earns a synthetic space.
const SPACE_GAP_RATIO: f64 = 0.25;

/// Multiple of the next line's font size within which two lines still belong
/// to one paragraph.
const PARAGRAPH_GAP_RATIO: f64 = 1.4;

/// Signed distance from `a` to `b` perpendicular to a baseline at `angle`,
/// positive in the reading direction (toward the next line).
///
/// Page coordinates have y increasing upward, so for horizontal text this is
/// simply `a.y - b.y`: the next line down scores positive.
#[inline]
#[must_use]
pub fn baseline_distance(a: Point, b: Point, angle: f64) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    -(dx * angle.sin() + dy * angle.cos())
}

/// Residual advance between the end of `a_span` (whose last glyph is `a`)
/// and glyph `b`: the gap remaining after `a`'s own advance is consumed.
fn spans_adv(a_span: &Span, a: &Glyph, b: &Glyph) -> f64 {
    a.pos.distance(&b.pos) - a.adv * a_span.trm.expansion()
}

/// Whether `b` may be appended to `a`: same writing mode, ctm4-equal
/// transforms and the same angle.
fn lines_are_compatible(a: &Line, b: &Line, angle_a: f64) -> bool {
    let sa = a.first_span();
    let sb = b.first_span();
    sa.vertical == sb.vertical && sa.ctm.eq4(&sb.ctm) && sb.angle() == angle_a
}

/// Join spans into lines.
///
/// Each span seeds a singleton line. For every line we look for the nearest
/// compatible line that continues it along its own baseline (within
/// [`ANGLE_TOLERANCE_DEG`] of the line's angle) and absorb it, inserting a
/// synthetic space when the residual gap exceeds a quarter of the average
/// per-glyph advance of the two boundary spans. First hit wins equal
/// distances.
#[must_use]
pub fn make_lines(spans: Vec<Span>) -> Vec<Line> {
    let total = spans.len();
    let mut lines: Vec<Option<Line>> = spans.into_iter().map(|s| Some(Line::from_span(s))).collect();

    let mut a = 0;
    while a < lines.len() {
        let Some(line_a) = lines[a].as_ref() else {
            a += 1;
            continue;
        };

        let span_a = line_a.last_span();
        let angle_a = span_a.angle();
        let last_a = *span_a.last_glyph();

        // Nearest compatible, aligned line by residual advance.
        let mut nearest: Option<(usize, f64)> = None;
        for (b, slot) in lines.iter().enumerate() {
            if b == a {
                continue;
            }
            let Some(line_b) = slot else { continue };
            if !lines_are_compatible(line_a, line_b, angle_a) {
                continue;
            }

            let first_b = line_b.first_glyph();
            let dx = first_b.pos.x - last_a.pos.x;
            let dy = first_b.pos.y - last_a.pos.y;
            let angle_a_b = (-dy).atan2(dx);
            if (angle_a_b - angle_a).abs().to_degrees() > ANGLE_TOLERANCE_DEG {
                continue;
            }

            let adv = spans_adv(span_a, &last_a, first_b);
            if nearest.map_or(true, |(_, best)| adv < best) {
                nearest = Some((b, adv));
            }
        }

        if let Some((b, nearest_adv)) = nearest {
            let mut line_b = lines[b].take().expect("nearest line is live");
            let line_a = lines[a].as_mut().expect("current line is live");

            let span_a = line_a.last_span();
            let span_b = line_b.first_span();

            // Average per-glyph advance of the two boundary spans decides
            // whether the gap is word-sized.
            let average_adv = (span_a.adv_total() + span_b.adv_total())
                / (span_a.glyphs.len() + span_b.glyphs.len()) as f64;

            if !span_a.last_glyph().is_space()
                && !span_b.first_glyph().is_space()
                && nearest_adv > SPACE_GAP_RATIO * average_adv
            {
                line_a
                    .spans
                    .last_mut()
                    .expect("line has a span")
                    .glyphs
                    .push(Glyph {
                        pre: Point::default(),
                        pos: Point::default(),
                        ucs: u32::from(' '),
                        adv: nearest_adv,
                    });
            }

            line_a.spans.append(&mut line_b.spans);

            if b > a {
                // The absorbed line never had its own turn; the grown line
                // may continue further, so examine it again.
                continue;
            }
        }
        a += 1;
    }

    let lines: Vec<Line> = lines.into_iter().flatten().collect();
    log::debug!("joined {total} spans into {} lines", lines.len());
    lines
}

/// Join lines into paragraphs and sort the result into reading order.
///
/// A line joins the paragraph above it when its baseline sits within
/// [`PARAGRAPH_GAP_RATIO`] times its font size of the paragraph's last
/// baseline. Joining dehyphenates: a trailing `'-'` on the upper line is
/// deleted; otherwise a synthetic space is appended unless one is already
/// there.
#[must_use]
pub fn make_paragraphs(lines: Vec<Line>) -> Vec<Paragraph> {
    let total = lines.len();
    let mut paragraphs: Vec<Option<Paragraph>> =
        lines.into_iter().map(|l| Some(Paragraph::from_line(l))).collect();

    let mut a = 0;
    while a < paragraphs.len() {
        let Some(paragraph_a) = paragraphs[a].as_ref() else {
            a += 1;
            continue;
        };

        let line_a = paragraph_a.last_line();
        let angle_a = line_a.angle();
        let last_a = line_a.last_glyph().pos;

        // Nearest compatible paragraph strictly below the current one.
        let mut nearest: Option<(usize, f64)> = None;
        for (b, slot) in paragraphs.iter().enumerate() {
            if b == a {
                continue;
            }
            let Some(paragraph_b) = slot else { continue };
            let line_b = paragraph_b.first_line();
            if !lines_are_compatible(line_a, line_b, angle_a) {
                continue;
            }
            let distance = baseline_distance(last_a, line_b.first_glyph().pos, angle_a);
            if distance > 0.0 && nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((b, distance));
            }
        }

        if let Some((b, distance)) = nearest {
            let size_b = paragraphs[b]
                .as_ref()
                .expect("nearest paragraph is live")
                .first_line()
                .font_size_max();
            if distance < PARAGRAPH_GAP_RATIO * size_b {
                let mut paragraph_b = paragraphs[b].take().expect("nearest paragraph is live");
                let paragraph_a = paragraphs[a].as_mut().expect("current paragraph is live");

                join_line_break(paragraph_a);
                paragraph_a.lines.append(&mut paragraph_b.lines);

                if b > a {
                    continue;
                }
            }
        }
        a += 1;
    }

    let mut paragraphs: Vec<Paragraph> = paragraphs.into_iter().flatten().collect();
    log::debug!("joined {total} lines into {} paragraphs", paragraphs.len());

    paragraphs.sort_by(paragraphs_cmp);
    paragraphs
}

/// Fix up the end of `paragraph`'s last line before the next paragraph's
/// lines are appended: delete a trailing hyphen, or append a synthetic space
/// when the line does not already end in one.
fn join_line_break(paragraph: &mut Paragraph) {
    let line = paragraph.lines.last_mut().expect("paragraph has a line");
    let span = line.spans.last_mut().expect("line has a span");
    let last = *span.last_glyph();

    if last.ucs == u32::from('-') {
        span.glyphs.pop();
        if span.glyphs.is_empty() {
            line.spans.pop();
            if line.spans.is_empty() {
                paragraph.lines.pop();
            }
        }
    } else if !last.is_space() {
        let ctm = span.ctm;
        span.glyphs.push(Glyph {
            pre: Point::default(),
            pos: Point::new(
                last.pos.x + last.adv * ctm.a,
                last.pos.y + last.adv * ctm.c,
            ),
            ucs: u32::from(' '),
            adv: 0.0,
        });
    }
}

/// Reading-order comparator for paragraphs on one page.
///
/// Paragraphs with differing ctm4 order by the lexicographic sign of the
/// difference, keeping each rotation grouped. Within a rotation, the signed
/// perpendicular distance at the mean angle decides; paragraphs more than
/// 90° apart are incomparable and keep their insertion order under the
/// stable sort.
#[must_use]
pub fn paragraphs_cmp(p1: &Paragraph, p2: &Paragraph) -> Ordering {
    let s1 = p1.first_line().first_span();
    let s2 = p2.first_line().first_span();

    let order = s1.ctm.cmp4(&s2.ctm);
    if order != Ordering::Equal {
        return order;
    }

    let angle1 = p1.first_line().angle();
    let angle2 = p2.first_line().angle();
    if (angle1 - angle2).abs() > std::f64::consts::FRAC_PI_2 {
        return Ordering::Equal;
    }

    let angle = (angle1 + angle2) / 2.0;
    let distance = baseline_distance(
        p1.first_line().first_glyph().pos,
        p2.first_line().first_glyph().pos,
        angle,
    );
    if distance > 0.0 {
        Ordering::Less
    } else if distance < 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Extent of the run of equally-rotated paragraphs starting at `p0`, in
/// pre-rotation units, together with the index one past the run's end.
///
/// The extent is measured from the first glyph of `paragraphs[p0]` by mapping
/// every line end through the inverse of the shared ctm's linear part. A
/// non-invertible ctm is logged and replaced by the identity, which treats
/// the run as axis-aligned.
#[must_use]
pub fn rotated_extent(paragraphs: &[Paragraph], p0: usize) -> (Point, usize) {
    let first = &paragraphs[p0];
    let rotation = first.rotation();
    let origin = first.first_line().first_glyph().pos;

    let ctm = first.ctm();
    let inverse = ctm.invert4().unwrap_or_else(|| {
        log::warn!(
            "cannot invert ctm ({} {} {} {}); treating rotated text as axis-aligned",
            ctm.a,
            ctm.b,
            ctm.c,
            ctm.d
        );
        crate::geom::Matrix::IDENTITY
    });

    let mut extent = Point::default();
    let mut p1 = p0;
    while p1 < paragraphs.len() && paragraphs[p1].rotation() == rotation {
        for line in &paragraphs[p1].lines {
            let span = line.last_span();
            let glyph = span.last_glyph();
            let adv = glyph.adv * span.trm.expansion();
            let end = Point::new(
                glyph.pos.x + adv * rotation.cos(),
                glyph.pos.y + adv * rotation.sin(),
            );
            let d = Point::new(end.x - origin.x, end.y - origin.y);
            let local = inverse.transform_vector(d);
            extent.x = extent.x.max(local.x);
            extent.y = extent.y.max(-local.y);
        }
        p1 += 1;
    }
    (extent, p1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Matrix;

    fn glyph(x: f64, y: f64, ucs: char, adv: f64) -> Glyph {
        Glyph {
            pre: Point::new(x, y),
            pos: Point::new(x, y),
            ucs: u32::from(ucs),
            adv,
        }
    }

    fn span(glyphs: Vec<Glyph>) -> Span {
        span_scaled(glyphs, 1.0)
    }

    fn span_scaled(glyphs: Vec<Glyph>, font_size: f64) -> Span {
        Span {
            ctm: Matrix::IDENTITY,
            trm: Matrix {
                a: font_size,
                d: font_size,
                ..Matrix::IDENTITY
            },
            font_name: "Helvetica".to_string(),
            bold: false,
            italic: false,
            vertical: false,
            glyphs,
        }
    }

    fn line_text(line: &Line) -> String {
        line.spans
            .iter()
            .flat_map(|s| s.glyphs.iter())
            .map(|g| char::from_u32(g.ucs).unwrap())
            .collect()
    }

    fn paragraph_text(paragraph: &Paragraph) -> String {
        paragraph.lines.iter().map(line_text).collect()
    }

    #[test]
    fn single_line_join_inserts_space() {
        // Two spans on one baseline with a word-sized gap between them.
        let a = span(vec![glyph(0.0, 0.0, 'H', 10.0), glyph(10.0, 0.0, 'i', 5.0)]);
        let b = span(vec![
            glyph(30.0, 0.0, 'w', 10.0),
            glyph(40.0, 0.0, 'o', 5.0),
            glyph(50.0, 0.0, 'r', 5.0),
            glyph(55.0, 0.0, 'l', 3.0),
            glyph(58.0, 0.0, 'd', 10.0),
        ]);
        let lines = make_lines(vec![a, b]);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "Hi world");
        // The synthetic space carries the residual gap as its advance.
        let space = &lines[0].spans[0].last_glyph();
        assert!((space.adv - 15.0).abs() < 1e-12);
    }

    #[test]
    fn small_gap_joins_without_space() {
        let a = span(vec![glyph(0.0, 0.0, 'a', 5.0)]);
        let b = span(vec![glyph(5.5, 0.0, 'b', 5.0)]);
        let lines = make_lines(vec![a, b]);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "ab");
    }

    #[test]
    fn misaligned_spans_stay_apart() {
        let a = span(vec![glyph(0.0, 0.0, 'a', 5.0)]);
        let b = span(vec![glyph(10.0, 8.0, 'b', 5.0)]);
        let lines = make_lines(vec![a, b]);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn different_ctm4_stays_apart() {
        let a = span(vec![glyph(0.0, 0.0, 'a', 5.0)]);
        let mut b = span(vec![glyph(10.0, 0.0, 'b', 5.0)]);
        b.ctm.a = 2.0;
        let lines = make_lines(vec![a, b]);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn lines_in_one_line_share_compatibility() {
        // Compatibility closure: every surviving line is internally uniform.
        let spans = vec![
            span(vec![glyph(0.0, 0.0, 'a', 5.0)]),
            span(vec![glyph(6.0, 0.0, 'b', 5.0)]),
            span(vec![glyph(12.0, 0.0, 'c', 5.0)]),
        ];
        let lines = make_lines(spans);
        for line in &lines {
            let first = line.first_span();
            for s in &line.spans {
                assert!(first.compatible(s));
                assert_eq!(s.angle(), first.angle());
            }
        }
    }

    #[test]
    fn dehyphenation_joins_and_drops_hyphen() {
        // The hyphen line sits 10 units above the continuation; a font size
        // of 10 puts the continuation within the join window.
        let upper = Line::from_span(span_scaled(
            vec![glyph(90.0, 20.0, 'r', 5.0), glyph(95.0, 20.0, '-', 5.0)],
            10.0,
        ));
        let lower = Line::from_span(span_scaled(vec![glyph(0.0, 10.0, 'a', 7.0)], 10.0));
        let paragraphs = make_paragraphs(vec![upper, lower]);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraph_text(&paragraphs[0]), "ra");
    }

    #[test]
    fn distant_lines_do_not_join() {
        // Same geometry but font size 1: 10 > 1.4 × 1.
        let upper = Line::from_span(span(vec![
            glyph(90.0, 20.0, 'r', 5.0),
            glyph(95.0, 20.0, '-', 5.0),
        ]));
        let lower = Line::from_span(span(vec![glyph(0.0, 10.0, 'a', 7.0)]));
        let paragraphs = make_paragraphs(vec![upper, lower]);
        assert_eq!(paragraphs.len(), 2);
    }

    #[test]
    fn join_inserts_space_between_lines() {
        let upper = Line::from_span(span_scaled(vec![glyph(0.0, 20.0, 'a', 5.0)], 10.0));
        let lower = Line::from_span(span_scaled(vec![glyph(0.0, 10.0, 'b', 5.0)], 10.0));
        let paragraphs = make_paragraphs(vec![upper, lower]);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraph_text(&paragraphs[0]), "a b");
        // The synthetic space sits one advance along the baseline.
        let space = paragraphs[0].lines[0].last_glyph();
        assert_eq!(space.pos, Point::new(5.0, 20.0));
    }

    #[test]
    fn dehyphenation_fires_only_once() {
        let upper = Line::from_span(span_scaled(
            vec![glyph(0.0, 20.0, 'r', 5.0), glyph(5.0, 20.0, '-', 5.0)],
            10.0,
        ));
        let lower = Line::from_span(span_scaled(vec![glyph(0.0, 10.0, 'a', 7.0)], 10.0));
        let once = make_paragraphs(vec![upper, lower]);
        assert_eq!(paragraph_text(&once[0]), "ra");

        // Re-joining the same lines deletes nothing further: the hyphen is
        // gone, so the boundary only gains the usual synthetic space.
        let relined: Vec<Line> = once.iter().flat_map(|p| p.lines.clone()).collect();
        let again = make_paragraphs(relined);
        assert_eq!(again.len(), 1);
        let non_space: String = paragraph_text(&again[0]).replace(' ', "");
        assert_eq!(non_space, "ra");
    }

    #[test]
    fn paragraphs_sort_top_to_bottom() {
        let bottom = Paragraph::from_line(Line::from_span(span(vec![glyph(0.0, 100.0, 'b', 5.0)])));
        let top = Paragraph::from_line(Line::from_span(span(vec![glyph(0.0, 700.0, 't', 5.0)])));
        assert_eq!(paragraphs_cmp(&top, &bottom), Ordering::Less);
        assert_eq!(paragraphs_cmp(&bottom, &top), Ordering::Greater);
    }

    #[test]
    fn ordering_monotonic_within_paragraph() {
        let lines: Vec<Line> = (0..4)
            .map(|i| {
                Line::from_span(span_scaled(
                    vec![glyph(0.0, 100.0 - 10.0 * f64::from(i), 'x', 5.0)],
                    10.0,
                ))
            })
            .collect();
        let paragraphs = make_paragraphs(lines);
        assert_eq!(paragraphs.len(), 1);
        let p = &paragraphs[0];
        for pair in p.lines.windows(2) {
            let d = baseline_distance(
                pair[0].first_glyph().pos,
                pair[1].first_glyph().pos,
                pair[0].angle(),
            );
            assert!(d > 0.0);
        }
    }

    #[test]
    fn rotated_paragraphs_with_zero_distance_sort_stably() {
        // 90°-rotated ctm; both first glyphs differ only along the baseline
        // normal's null direction, so the comparator reports Equal and the
        // stable sort preserves insertion order.
        let rot = Matrix {
            a: 0.0,
            b: 1.0,
            c: -1.0,
            d: 0.0,
            e: 0.0,
            f: 0.0,
        };
        let mk = |x: f64, y: f64, c: char| {
            let mut s = span(vec![glyph(x, y, c, 5.0)]);
            s.ctm = rot;
            Paragraph::from_line(Line::from_span(s))
        };
        let p1 = mk(50.0, 10.0, '1');
        let p2 = mk(50.0, 60.0, '2');
        assert_eq!(paragraphs_cmp(&p1, &p2), Ordering::Equal);

        let mut v = vec![p1.clone(), p2.clone()];
        v.sort_by(paragraphs_cmp);
        assert_eq!(paragraph_text(&v[0]), "1");
        assert_eq!(paragraph_text(&v[1]), "2");
    }

    #[test]
    fn different_rotations_group_by_ctm4() {
        let mut rotated = span(vec![glyph(0.0, 0.0, 'r', 5.0)]);
        rotated.ctm = Matrix {
            a: 0.0,
            b: 1.0,
            c: -1.0,
            d: 0.0,
            e: 0.0,
            f: 0.0,
        };
        let p_rot = Paragraph::from_line(Line::from_span(rotated));
        let p_flat = Paragraph::from_line(Line::from_span(span(vec![glyph(0.0, 50.0, 'f', 5.0)])));
        // ctm4 (0,1,-1,0) < (1,0,0,1) on the first component.
        assert_eq!(paragraphs_cmp(&p_rot, &p_flat), Ordering::Less);
    }

    #[test]
    fn rotated_extent_covers_run() {
        let p = Paragraph::from_line(Line::from_span(span(vec![
            glyph(10.0, 10.0, 'a', 5.0),
            glyph(15.0, 10.0, 'b', 5.0),
        ])));
        let (extent, p1) = rotated_extent(&[p], 0);
        assert_eq!(p1, 1);
        assert!((extent.x - 10.0).abs() < 1e-12);
    }

    #[test]
    fn rotated_extent_degenerate_ctm_falls_back() {
        let mut s = span(vec![glyph(0.0, 0.0, 'a', 5.0)]);
        s.ctm = Matrix {
            a: 1.0,
            b: 2.0,
            c: 2.0,
            d: 4.0,
            e: 0.0,
            f: 0.0,
        };
        let p = Paragraph::from_line(Line::from_span(s));
        // Must not panic; the identity fallback yields a finite extent.
        let (extent, _) = rotated_extent(&[p], 0);
        assert!(extent.x.is_finite() && extent.y.is_finite());
    }
}
