use std::cmp::Ordering;

/// Ratio of the component height used as the histogram smearing window.
const HIST_WND_RATIO: f32 = 1.0 / 12.0;
/// Ratio of the component height skipped after each detected split point.
const SEG_PT_WND_RATIO: f32 = 1.0 / 5.0;

/// A connected component of foreground pixels, or a piece of one produced by
/// splitting at vertical pixel-density minima. Keeps the raw point list so
/// that composite character samples can be rendered from any run of segments.
#[derive(Debug, Clone, Default)]
pub struct ConComp {
    id: i32,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    left_most: bool,
    right_most: bool,
    points: Vec<(i32, i32)>,
}

impl ConComp {
    pub fn new() -> Self {
        ConComp {
            id: -1,
            ..Default::default()
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn width(&self) -> i32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top + 1
    }

    pub fn left_most(&self) -> bool {
        self.left_most
    }

    pub fn right_most(&self) -> bool {
        self.right_most
    }

    pub fn set_left_most(&mut self, flag: bool) {
        self.left_most = flag;
    }

    pub fn set_right_most(&mut self, flag: bool) {
        self.right_most = flag;
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    /// Adds a point and grows the bounding box.
    pub fn add(&mut self, x: i32, y: i32) {
        if self.points.is_empty() {
            self.left = x;
            self.right = x;
            self.top = y;
            self.bottom = y;
        } else {
            self.left = self.left.min(x);
            self.top = self.top.min(y);
            self.right = self.right.max(x);
            self.bottom = self.bottom.max(y);
        }
        self.points.push((x, y));
    }

    /// Merges another component into this one.
    pub fn merge(&mut self, other: ConComp) {
        if other.points.is_empty() {
            return;
        }
        if self.points.is_empty() {
            *self = other;
            return;
        }
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
        self.points.extend(other.points);
    }

    /// Reading-order comparator for left-to-right scripts.
    pub fn left_to_right(a: &ConComp, b: &ConComp) -> Ordering {
        (a.left + a.right).cmp(&(b.left + b.right))
    }

    /// Reading-order comparator for right-to-left scripts.
    pub fn right_to_left(a: &ConComp, b: &ConComp) -> Ordering {
        (b.right + b.left).cmp(&(a.right + a.left))
    }

    /// Creates the x-coord density histogram after smearing each x position
    /// by a window proportional to the component height, capped at
    /// `max_hist_wnd`.
    fn create_histogram(&self, max_hist_wnd: i32) -> Vec<i32> {
        let wid = self.width();
        let hgt = self.height();
        let mut hist_wnd = (hgt as f32 * HIST_WND_RATIO) as i32;
        if hist_wnd > max_hist_wnd {
            hist_wnd = max_hist_wnd;
        }

        let mut hist = vec![0i32; wid as usize];
        for &(x, _) in &self.points {
            let x = x - self.left;
            for xdel in -hist_wnd..=hist_wnd {
                let xw = x + xdel;
                if xw >= 0 && xw < wid {
                    hist[xw as usize] += 1;
                }
            }
        }
        hist
    }

    /// Finds split points at local minima of the histogram.
    fn segment_histogram(&self, hist: &[i32]) -> Vec<i32> {
        let wid = self.width();
        let hgt = self.height();
        let mut seg_pt_wnd = (hgt as f32 * SEG_PT_WND_RATIO) as i32;
        if seg_pt_wnd > 1 {
            seg_pt_wnd = 1;
        }

        let mut seg_pts = Vec::new();
        let mut x = 2;
        while x < wid - 2 {
            let h = hist[x as usize];
            let hm1 = hist[(x - 1) as usize];
            let hm2 = hist[(x - 2) as usize];
            let hp1 = hist[(x + 1) as usize];
            let hp2 = hist[(x + 2) as usize];
            if (h < hm1 && h < hm2 && h <= hp1 && h <= hp2)
                || (h <= hm1 && h <= hm2 && h < hp1 && h < hp2)
            {
                seg_pts.push(x);
                x += seg_pt_wnd;
            }
            x += 1;
        }
        seg_pts
    }

    /// Splits the component at vertical density minima. Returns `None` when
    /// no split point was found; the caller then keeps the component whole.
    pub fn segment(&self, max_hist_wnd: i32) -> Option<Vec<ConComp>> {
        if self.points.is_empty() {
            return None;
        }

        let hist = self.create_histogram(max_hist_wnd);
        let seg_pts = self.segment_histogram(&hist);
        if seg_pts.is_empty() {
            return None;
        }

        let mut pieces: Vec<ConComp> = (0..=seg_pts.len())
            .map(|_| {
                let mut piece = ConComp::new();
                piece.set_id(self.id);
                piece
            })
            .collect();
        pieces[0].left_most = true;
        pieces[seg_pts.len()].right_most = true;

        for &(x, y) in &self.points {
            // first split point whose x exceeds the point's x
            let piece = seg_pts
                .iter()
                .position(|&seg_x| seg_x + self.left > x)
                .unwrap_or(seg_pts.len());
            pieces[piece].add(x, y);
        }

        Some(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_box(left: i32, top: i32, wid: i32, hgt: i32) -> ConComp {
        let mut comp = ConComp::new();
        for y in top..top + hgt {
            for x in left..left + wid {
                comp.add(x, y);
            }
        }
        comp
    }

    #[test]
    fn test_bounding_box() {
        let comp = filled_box(3, 1, 4, 2);
        assert_eq!((comp.left(), comp.top()), (3, 1));
        assert_eq!((comp.width(), comp.height()), (4, 2));
        assert_eq!(comp.point_count(), 8);
    }

    #[test]
    fn test_merge() {
        let mut a = filled_box(0, 0, 2, 2);
        let b = filled_box(5, 0, 2, 2);
        a.merge(b);
        assert_eq!(a.width(), 7);
        assert_eq!(a.point_count(), 8);
    }

    #[test]
    fn test_segment_splits_dumbbell() {
        // two dense 6x6 blobs joined by a thin 1px bridge
        let mut comp = filled_box(0, 0, 6, 6);
        comp.merge(filled_box(12, 0, 6, 6));
        for x in 6..12 {
            comp.add(x, 3);
        }
        let pieces = comp.segment(2).expect("bridge should split");
        assert!(pieces.len() >= 2);
        assert!(pieces[0].left_most());
        assert!(pieces[pieces.len() - 1].right_most());
        let total: usize = pieces.iter().map(|p| p.point_count()).sum();
        assert_eq!(total, comp.point_count());
    }

    #[test]
    fn test_segment_none_for_solid_box() {
        let comp = filled_box(0, 0, 4, 10);
        assert!(comp.segment(2).is_none());
    }

    #[test]
    fn test_reading_order() {
        let mut comps = vec![filled_box(10, 0, 2, 2), filled_box(0, 0, 2, 2)];
        comps.sort_by(ConComp::left_to_right);
        assert_eq!(comps[0].left(), 0);
        comps.sort_by(ConComp::right_to_left);
        assert_eq!(comps[0].left(), 10);
    }
}
