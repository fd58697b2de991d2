use std::f32::consts::PI;

use once_cell::sync::Lazy;

use crate::conncomp::ConComp;
use crate::error::CubeErrorKind;
use crate::CubeResult;

/// Background pixel value. Anything darker is foreground.
const BACKGROUND: u8 = 0xff;

const MIN_DESLANT_ANGLE: f32 = -30.0;
const MAX_DESLANT_ANGLE: f32 = 30.0;
const DESLANT_ANGLE_DELTA: f32 = 0.5;
const DESLANT_ANGLE_COUNT: usize =
    1 + ((MAX_DESLANT_ANGLE - MIN_DESLANT_ANGLE) / DESLANT_ANGLE_DELTA) as usize;

/// Tangents of the candidate shear angles, precomputed once per process.
static TAN_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..DESLANT_ANGLE_COUNT)
        .map(|idx| {
            let ang = MIN_DESLANT_ANGLE + idx as f32 * DESLANT_ANGLE_DELTA;
            (ang * PI / 180.0).tan()
        })
        .collect()
});

/// An 8-bit grayscale raster. Foreground ink is dark (0), background is 0xff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    wid: usize,
    hgt: usize,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(wid: usize, hgt: usize) -> Self {
        Bitmap {
            wid,
            hgt,
            pixels: vec![BACKGROUND; wid * hgt],
        }
    }

    /// Builds a bitmap from row-major raw bytes.
    pub fn from_raw_data(wid: usize, hgt: usize, data: &[u8]) -> CubeResult<Self> {
        if data.len() != wid * hgt {
            return Err(CubeErrorKind::Args.with_error(anyhow::anyhow!(
                "raster size mismatch: {}x{} needs {} bytes, got {}",
                wid,
                hgt,
                wid * hgt,
                data.len()
            )));
        }
        Ok(Bitmap {
            wid,
            hgt,
            pixels: data.to_vec(),
        })
    }

    pub fn width(&self) -> usize {
        self.wid
    }

    pub fn height(&self) -> usize {
        self.hgt
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.wid + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, val: u8) {
        self.pixels[y * self.wid + x] = val;
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.pixels[y * self.wid..(y + 1) * self.wid]
    }

    fn is_blank_column(&self, x: usize) -> bool {
        (0..self.hgt).all(|y| self.get(x, y) == BACKGROUND)
    }

    fn is_blank_row(&self, y: usize) -> bool {
        self.row(y).iter().all(|&p| p == BACKGROUND)
    }

    /// Returns the bounds (x, y, wid, hgt) of the inked region.
    pub fn crop_bounds(&self) -> (usize, usize, usize, usize) {
        let mut xst = 0;
        let mut xend = self.wid.saturating_sub(1);
        let mut yst = 0;
        let mut yend = self.hgt.saturating_sub(1);

        while xst < self.wid - 1 && xst <= xend && self.is_blank_column(xst) {
            xst += 1;
        }
        while xend > 0 && xend >= xst && self.is_blank_column(xend) {
            xend -= 1;
        }
        while yst < self.hgt - 1 && yst <= yend && self.is_blank_row(yst) {
            yst += 1;
        }
        while yend > 0 && yend >= yst && self.is_blank_row(yend) {
            yend -= 1;
        }

        if xend < xst || yend < yst {
            return (0, 0, 0, 0);
        }
        (xst, yst, xend - xst + 1, yend - yst + 1)
    }

    /// Copies out a sub-rectangle, clipped to the bitmap.
    pub fn copy_rect(&self, x_st: usize, y_st: usize, wid: usize, hgt: usize) -> Bitmap {
        let mut dest = Bitmap::new(wid, hgt);
        let x_end = (x_st + wid).min(self.wid);
        let y_end = (y_st + hgt).min(self.hgt);
        for y in y_st..y_end {
            for x in x_st..x_end {
                dest.set(x - x_st, y - y_st, self.get(x, y));
            }
        }
        dest
    }

    /// Produces a copy scaled to the given dimensions. When `isotropic` is
    /// set the source aspect ratio is preserved and the result is centered.
    /// Shrinking accumulates source pixels and takes their mean; growing is
    /// nearest-neighbor.
    pub fn scaled(&self, wid: usize, hgt: usize, isotropic: bool) -> Bitmap {
        let mut dest = Bitmap::new(wid, hgt);
        let wid_src = self.wid as i64;
        let hgt_src = self.hgt as i64;
        if wid_src == 0 || hgt_src == 0 || wid == 0 || hgt == 0 {
            return dest;
        }

        let (x_num, x_denom, y_num, y_denom) = if isotropic {
            if (wid as i64 * hgt_src) > (hgt as i64 * wid_src) {
                (hgt as i64, hgt_src, hgt as i64, hgt_src)
            } else {
                (wid as i64, wid_src, wid as i64, wid_src)
            }
        } else {
            (wid as i64, wid_src, hgt as i64, hgt_src)
        };

        let xoff = (wid as i64 - (x_num * wid_src) / x_denom) / 2;
        let yoff = (hgt as i64 - (y_num * hgt_src) / y_denom) / 2;

        if y_num > y_denom {
            for ydest in yoff..(hgt as i64 - yoff) {
                let ysrc = (0.5 + (ydest - yoff) as f64 * y_denom as f64 / y_num as f64) as i64;
                if ysrc < 0 || ysrc >= hgt_src {
                    continue;
                }
                for xdest in xoff..(wid as i64 - xoff) {
                    let xsrc =
                        (0.5 + (xdest - xoff) as f64 * x_denom as f64 / x_num as f64) as i64;
                    if xsrc < 0 || xsrc >= wid_src {
                        continue;
                    }
                    dest.set(
                        xdest as usize,
                        ydest as usize,
                        self.get(xsrc as usize, ysrc as usize),
                    );
                }
            }
        } else {
            // accumulate pixels then compute means
            let mut sums = vec![0u32; wid * hgt];
            let mut cnts = vec![0u32; wid * hgt];
            for ysrc in 0..hgt_src {
                let ydest = yoff + (0.5 + ysrc as f64 * y_num as f64 / y_denom as f64) as i64;
                if ydest < 0 || ydest >= hgt as i64 {
                    continue;
                }
                for xsrc in 0..wid_src {
                    let xdest = xoff + (0.5 + xsrc as f64 * x_num as f64 / x_denom as f64) as i64;
                    if xdest < 0 || xdest >= wid as i64 {
                        continue;
                    }
                    let off = ydest as usize * wid + xdest as usize;
                    sums[off] += self.get(xsrc as usize, ysrc as usize) as u32;
                    cnts[off] += 1;
                }
            }
            for off in 0..wid * hgt {
                if cnts[off] > 0 {
                    dest.pixels[off] = (sums[off] / cnts[off]).min(255) as u8;
                }
            }
        }
        dest
    }

    /// Detects connected components using a top/left neighborhood scan,
    /// merging labels on collision. Components with `min_size` points or
    /// fewer are dropped; survivors get sequential ids and both extremity
    /// flags set.
    pub fn find_con_comps(&self, min_size: usize) -> Vec<ConComp> {
        let mut labels = vec![0u32; self.wid * self.hgt];
        let mut comps: Vec<Option<ConComp>> = Vec::new();

        // neighbors above and to the left of the scan position
        const NBR: [(i32, i32); 4] = [(-1, -1), (0, -1), (1, -1), (-1, 0)];

        for y in 0..self.hgt as i32 {
            for x in 0..self.wid as i32 {
                if self.get(x as usize, y as usize) == BACKGROUND {
                    continue;
                }
                let mut master: Option<u32> = None;
                for &(dx, dy) in &NBR {
                    let xn = x + dx;
                    let yn = y + dy;
                    if xn < 0 || yn < 0 || xn >= self.wid as i32 || yn >= self.hgt as i32 {
                        continue;
                    }
                    if self.get(xn as usize, yn as usize) == BACKGROUND {
                        continue;
                    }
                    let label = labels[yn as usize * self.wid + xn as usize];
                    match master {
                        None => {
                            master = Some(label);
                            labels[y as usize * self.wid + x as usize] = label;
                            comps[(label - 1) as usize]
                                .as_mut()
                                .expect("labelled component missing")
                                .add(x, y);
                        }
                        Some(master_label) if label != master_label => {
                            // relabel and merge the later component
                            let merged = comps[(label - 1) as usize]
                                .take()
                                .expect("labelled component missing");
                            for &(px, py) in merged.points() {
                                labels[py as usize * self.wid + px as usize] = master_label;
                            }
                            comps[(master_label - 1) as usize]
                                .as_mut()
                                .expect("labelled component missing")
                                .merge(merged);
                        }
                        Some(_) => {}
                    }
                }
                if master.is_none() {
                    let mut comp = ConComp::new();
                    comp.add(x, y);
                    comps.push(Some(comp));
                    labels[y as usize * self.wid + x as usize] = comps.len() as u32;
                }
            }
        }

        let mut result = Vec::new();
        for comp in comps.into_iter().flatten() {
            if comp.point_count() > min_size {
                let mut comp = comp;
                comp.set_left_most(true);
                comp.set_right_most(true);
                comp.set_id(result.len() as i32);
                result.push(comp);
            }
        }
        result
    }

    /// Removes the dominant slant by shearing with the angle that minimizes
    /// the entropy of the vertical pixel-column histogram. Narrow bitmaps
    /// (width < 2x height) are left untouched since the estimate would be
    /// unreliable.
    pub fn deslant(&mut self) {
        if self.wid < self.hgt * 2 {
            return;
        }

        let tan_table = &*TAN_TABLE;
        let min_des_x = (0.5 + (self.hgt - 1) as f32 * tan_table[0]) as i32;
        let max_des_x = (self.wid - 1) as i32
            + (0.5 + (self.hgt - 1) as f32 * tan_table[DESLANT_ANGLE_COUNT - 1]) as i32;
        let des_wid = (max_des_x - min_des_x + 1) as usize;

        let mut angle_hist = vec![vec![0i32; des_wid]; DESLANT_ANGLE_COUNT];
        for y in 0..self.hgt {
            for x in 0..self.wid {
                if self.get(x, y) == BACKGROUND {
                    continue;
                }
                let des_y = (self.hgt - y - 1) as f32;
                for (ang_idx, &tan) in tan_table.iter().enumerate() {
                    let des_x = x as i32 + (0.5 + des_y * tan) as i32;
                    if des_x >= min_des_x && des_x <= max_des_x {
                        angle_hist[ang_idx][(des_x - min_des_x) as usize] += 1;
                    }
                }
            }
        }

        let mut best_ang = None;
        let mut best_entropy = 0.0f64;
        for (ang_idx, hist) in angle_hist.iter().enumerate() {
            let mut entropy = 0.0f64;
            for &cnt in hist {
                if cnt > 0 {
                    let norm_val = cnt as f64 / self.hgt as f64;
                    entropy += -norm_val * norm_val.ln();
                }
            }
            if best_ang.is_none() || entropy < best_entropy {
                best_ang = Some(ang_idx);
                best_entropy = entropy;
            }
        }

        if let Some(best_ang) = best_ang {
            let mut dest = Bitmap::new(des_wid, self.hgt);
            for y in 0..self.hgt {
                for x in 0..self.wid {
                    if self.get(x, y) == BACKGROUND {
                        continue;
                    }
                    let des_y = (self.hgt - y - 1) as f32;
                    let des_x = x as i32 + (0.5 + des_y * tan_table[best_ang]) as i32;
                    dest.set((des_x - min_des_x) as usize, y, 0);
                }
            }
            *self = dest;
        }
    }

    /// Parses a PGM image (binary `P5` or ASCII `P2`).
    pub fn from_pgm(data: &[u8]) -> CubeResult<Bitmap> {
        let mut tokens = Vec::new();
        let mut pos = 0;
        // header: magic, width, height, maxval with '#' comments
        while tokens.len() < 4 && pos < data.len() {
            while pos < data.len() && (data[pos] as char).is_whitespace() {
                pos += 1;
            }
            if pos < data.len() && data[pos] == b'#' {
                while pos < data.len() && data[pos] != b'\n' {
                    pos += 1;
                }
                continue;
            }
            let start = pos;
            while pos < data.len() && !(data[pos] as char).is_whitespace() {
                pos += 1;
            }
            if pos > start {
                tokens.push(
                    std::str::from_utf8(&data[start..pos])
                        .map_err(|err| CubeErrorKind::Decode.with_error(anyhow::anyhow!(err)))?
                        .to_string(),
                );
            }
        }
        if tokens.len() < 4 {
            return Err(CubeErrorKind::Decode.with_error(anyhow::anyhow!("truncated pgm header")));
        }
        let magic = tokens[0].as_str();
        let wid: usize = tokens[1]
            .parse()
            .map_err(|err| CubeErrorKind::Parse.with_error(anyhow::anyhow!("pgm width: {}", err)))?;
        let hgt: usize = tokens[2].parse().map_err(|err| {
            CubeErrorKind::Parse.with_error(anyhow::anyhow!("pgm height: {}", err))
        })?;
        let maxval: u32 = tokens[3].parse().map_err(|err| {
            CubeErrorKind::Parse.with_error(anyhow::anyhow!("pgm maxval: {}", err))
        })?;
        if maxval == 0 || maxval > 255 {
            return Err(CubeErrorKind::Decode
                .with_error(anyhow::anyhow!("unsupported pgm maxval: {}", maxval)));
        }

        match magic {
            "P5" => {
                pos += 1; // single whitespace after maxval
                if data.len() < pos + wid * hgt {
                    return Err(
                        CubeErrorKind::Decode.with_error(anyhow::anyhow!("truncated pgm data"))
                    );
                }
                Bitmap::from_raw_data(wid, hgt, &data[pos..pos + wid * hgt])
            }
            "P2" => {
                let text = std::str::from_utf8(&data[pos..])
                    .map_err(|err| CubeErrorKind::Decode.with_error(anyhow::anyhow!(err)))?;
                let pixels: Vec<u8> = text
                    .split_whitespace()
                    .take(wid * hgt)
                    .map(|tok| tok.parse::<u8>())
                    .collect::<Result<_, _>>()
                    .map_err(|err| CubeErrorKind::Parse.with_error(anyhow::anyhow!(err)))?;
                if pixels.len() != wid * hgt {
                    return Err(
                        CubeErrorKind::Decode.with_error(anyhow::anyhow!("truncated pgm data"))
                    );
                }
                Bitmap::from_raw_data(wid, hgt, &pixels)
            }
            other => Err(CubeErrorKind::Decode
                .with_error(anyhow::anyhow!("unsupported pgm magic: {}", other))),
        }
    }

    /// Serializes to binary PGM (`P5`).
    pub fn to_pgm(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.wid, self.hgt).into_bytes();
        out.extend_from_slice(&self.pixels);
        out
    }
}
