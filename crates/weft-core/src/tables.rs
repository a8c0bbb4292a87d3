//! Table reconstruction from detected ruling-line segments.
//!
//! The external line detector supplies two lists of zero-extent rectangles:
//! horizontal segments (one y, an x extent) and vertical segments (one x, a
//! y extent), in page coordinates. From these we find candidate table
//! rectangles, derive the row and column axes from the joint points, build
//! the cell grid, label cell edges, compute merged cells, and finally route
//! every glyph that falls inside a cell into that cell's own line/paragraph
//! assembly while removing it from the page-level stream.
//!
//! Anything that fails to form a plausible table (too few joints, a
//! degenerate axis) is skipped without error; its glyphs stay on the page.

use crate::geom::{Point, Rect};
use crate::model::{Cell, Ruling, Span, Table, UCS_REMOVED};

/// Tolerance, in page units, for joint detection, axis merging and edge
/// matching.
const TOLERANCE: f64 = 2.0;

/// Minimum number of joint points for a candidate rect to count as a table.
const MIN_JOINTS: usize = 5;

/// Reconstruct all tables found in the ruling segments, draining the routed
/// glyphs out of `spans`.
#[must_use]
pub fn reconstruct_tables(
    spans: &mut Vec<Span>,
    horizontal: &[Ruling],
    vertical: &[Ruling],
) -> Vec<Table> {
    let mut tables = Vec::new();
    for rect in find_table_rects(horizontal, vertical) {
        if let Some(mut table) = build_grid(rect, horizontal, vertical) {
            route_glyphs(spans, &mut table);
            tables.push(table);
        }
    }
    tables
}

/// All intersections of one vertical with one horizontal segment.
fn joints(horizontal: &[Ruling], vertical: &[Ruling]) -> Vec<Point> {
    let mut points = Vec::new();
    for v in vertical {
        let x = v.min.x;
        for h in horizontal {
            let y = h.min.y;
            if x >= h.min.x - TOLERANCE
                && x <= h.max.x + TOLERANCE
                && y >= v.min.y - TOLERANCE
                && y <= v.max.y + TOLERANCE
            {
                points.push(Point::new(x, y));
            }
        }
    }
    points
}

/// Candidate table rectangles: bounding boxes of connected components of the
/// segment set, kept when they enclose at least [`MIN_JOINTS`] joint points.
fn find_table_rects(horizontal: &[Ruling], vertical: &[Ruling]) -> Vec<Rect> {
    let segments: Vec<&Ruling> = horizontal.iter().chain(vertical.iter()).collect();
    if segments.is_empty() {
        return Vec::new();
    }

    // Union-find over segments; two segments connect when they touch.
    let mut parent: Vec<usize> = (0..segments.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for i in 0..segments.len() {
        for j in i + 1..segments.len() {
            if segments[i]
                .inflate(TOLERANCE)
                .intersect(segments[j])
                .is_valid()
            {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut boxes: Vec<Option<Rect>> = vec![None; segments.len()];
    for (i, segment) in segments.iter().enumerate() {
        let root = find(&mut parent, i);
        let entry = boxes[root].get_or_insert(Rect::EMPTY);
        *entry = entry.union(segment);
    }

    let all_joints = joints(horizontal, vertical);
    let mut rects: Vec<Rect> = boxes
        .into_iter()
        .flatten()
        .filter(|rect| {
            let grown = rect.inflate(TOLERANCE);
            let count = all_joints.iter().filter(|j| grown.contains(**j)).count();
            if count < MIN_JOINTS {
                log::debug!("rejecting candidate table rect with {count} joints");
                false
            } else {
                true
            }
        })
        .collect();
    // Topmost table first; descending y in page coordinates.
    rects.sort_by(|a, b| b.max.y.total_cmp(&a.max.y));
    rects
}

/// Sorted axis positions with successive values within [`TOLERANCE`]
/// replaced by their mean.
fn merge_close(mut values: Vec<f64>, descending: bool) -> Vec<f64> {
    if descending {
        values.sort_by(|a, b| b.total_cmp(a));
    } else {
        values.sort_by(f64::total_cmp);
    }
    let mut merged: Vec<f64> = Vec::new();
    for value in values {
        if let Some(last) = merged.last_mut() {
            if (*last - value).abs() <= TOLERANCE {
                *last = (*last + value) / 2.0;
                continue;
            }
        }
        merged.push(value);
    }
    merged
}

/// Build the cell grid for one table rect: axes, cells, edge labels and
/// merges. Returns `None` when either axis degenerates.
fn build_grid(rect: Rect, horizontal: &[Ruling], vertical: &[Ruling]) -> Option<Table> {
    // Restrict to segments whose endpoints lie inside the rect, with slack.
    let grown = rect.inflate(TOLERANCE);
    let horizontal: Vec<Ruling> = horizontal
        .iter()
        .filter(|s| grown.contains(s.min) && grown.contains(s.max))
        .copied()
        .collect();
    let vertical: Vec<Ruling> = vertical
        .iter()
        .filter(|s| grown.contains(s.min) && grown.contains(s.max))
        .copied()
        .collect();

    let joint_points = joints(&horizontal, &vertical);

    let mut ys: Vec<f64> = joint_points.iter().map(|p| p.y).collect();
    ys.push(rect.max.y);
    ys.push(rect.min.y);
    let rows0 = merge_close(ys, true);

    let mut xs: Vec<f64> = joint_points.iter().map(|p| p.x).collect();
    xs.push(rect.min.x);
    xs.push(rect.max.x);
    let cols0 = merge_close(xs, false);

    if rows0.len() < 2 || cols0.len() < 2 {
        log::debug!("skipping table rect: degenerate axes");
        return None;
    }

    // Row i spans (rows0[i], rows0[i+1]) with rows0 descending, so .0 is the
    // upper y. Column j spans (cols0[j], cols0[j+1]) ascending.
    let rows: Vec<(f64, f64)> = rows0.windows(2).map(|w| (w[0], w[1])).collect();
    let cols: Vec<(f64, f64)> = cols0.windows(2).map(|w| (w[0], w[1])).collect();
    let cells_num_x = cols.len();
    let cells_num_y = rows.len();

    let mut cells: Vec<Cell> = Vec::with_capacity(cells_num_x * cells_num_y);
    for &(top, bottom) in &rows {
        for &(left, right) in &cols {
            cells.push(Cell::new(Rect::new(left, bottom, right, top)));
        }
    }
    let at = |ix: usize, iy: usize| iy * cells_num_x + ix;

    // Interior edges from the segments.
    for segment in &vertical {
        let x = segment.min.x;
        let Some(ix) = cols.iter().position(|c| (c.0 - x).abs() <= TOLERANCE) else {
            continue;
        };
        for (iy, row) in rows.iter().enumerate() {
            let covers = segment.min.y <= row.1 + TOLERANCE && segment.max.y >= row.0 - TOLERANCE;
            if covers {
                cells[at(ix, iy)].left = true;
                if ix > 0 {
                    cells[at(ix - 1, iy)].right = true;
                }
            }
        }
    }
    for segment in &horizontal {
        let y = segment.min.y;
        let Some(iy) = rows.iter().position(|r| (r.0 - y).abs() <= TOLERANCE) else {
            continue;
        };
        for (ix, col) in cols.iter().enumerate() {
            let covers = segment.min.x <= col.0 + TOLERANCE && segment.max.x >= col.1 - TOLERANCE;
            if covers {
                cells[at(ix, iy)].top = true;
                if iy > 0 {
                    cells[at(ix, iy - 1)].bottom = true;
                }
            }
        }
    }

    // The outer border always closes the grid.
    for ix in 0..cells_num_x {
        cells[at(ix, 0)].top = true;
        cells[at(ix, cells_num_y - 1)].bottom = true;
    }
    for iy in 0..cells_num_y {
        cells[at(0, iy)].left = true;
        cells[at(cells_num_x - 1, iy)].right = true;
    }

    // Merges: a continuation cell extends the nearest closed predecessor in
    // its row (missing left) or column (missing top).
    for iy in 0..cells_num_y {
        for ix in 0..cells_num_x {
            if !cells[at(ix, iy)].left {
                for kx in (0..ix).rev() {
                    if cells[at(kx, iy)].left {
                        cells[at(kx, iy)].extend_right += 1;
                        break;
                    }
                }
            } else if !cells[at(ix, iy)].top {
                for ky in (0..iy).rev() {
                    if cells[at(ix, ky)].top {
                        cells[at(ix, ky)].extend_down += 1;
                        break;
                    }
                }
            }
        }
    }

    let rect = Rect::new(
        cols0[0],
        rows0[rows0.len() - 1],
        cols0[cols0.len() - 1],
        rows0[0],
    );
    log::debug!("table grid {cells_num_x}x{cells_num_y} at ({}, {})", rect.min.x, rect.max.y);
    Some(Table {
        origin: Point::new(rect.min.x, rect.max.y),
        rect,
        cells_num_x,
        cells_num_y,
        cells,
    })
}

/// Move glyphs lying inside the table's cells out of `spans` and into the
/// owning cells, then reconstruct each cell's own lines and paragraphs.
///
/// A merged cell claims the glyphs of its whole covered region; continuation
/// cells own nothing. Routed glyphs are first marked with a sentinel scalar
/// and then purged; a span drained empty is removed from the page.
fn route_glyphs(spans: &mut Vec<Span>, table: &mut Table) {
    for iy in 0..table.cells_num_y {
        for ix in 0..table.cells_num_x {
            let index = iy * table.cells_num_x + ix;
            if table.cells[index].is_continuation() {
                continue;
            }

            // The merged region covered by this cell.
            let cell = &table.cells[index];
            let last_x = (ix + cell.extend_right).min(table.cells_num_x) - 1;
            let last_y = (iy + cell.extend_down).min(table.cells_num_y) - 1;
            let region = cell
                .rect
                .union(&table.cells[last_y * table.cells_num_x + last_x].rect);

            let mut cell_spans: Vec<Span> = Vec::new();
            for span in spans.iter_mut() {
                let mut taken = span.derived();
                for glyph in &mut span.glyphs {
                    if region.contains_half_open(glyph.pos) {
                        taken.glyphs.push(*glyph);
                        glyph.ucs = UCS_REMOVED;
                    }
                }
                if !taken.glyphs.is_empty() {
                    span.glyphs.retain(|g| g.ucs != UCS_REMOVED);
                    cell_spans.push(taken);
                }
            }
            spans.retain(|s| !s.glyphs.is_empty());

            if !cell_spans.is_empty() {
                let lines = crate::join::make_lines(cell_spans);
                table.cells[index].paragraphs = crate::join::make_paragraphs(lines);
            }
        }
    }
}
