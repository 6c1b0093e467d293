//! Reader and writer for ESRI ASCII grids.
//!
//! ```text
//! ncols        4
//! nrows        3
//! xllcorner    500000.0      (or xllcenter)
//! yllcorner    4100000.0     (or yllcenter)
//! cellsize     1000.0        (or dx / dy)
//! NODATA_value -9999
//! <nrows lines of ncols values, north to south>
//! ```
//!
//! `xllcorner` gives a pixel-registered grid, `xllcenter` a
//! gridline-registered one. NODATA samples become NaN.

use std::path::Path;

use ndarray::Array2;
use thiserror::Error;

use gravfft_core::grid::{CoordinateSystem, Grid, Registration};

const DEFAULT_NODATA: f64 = -9999.0;

/// Errors while reading a grid file.
#[derive(Debug, Error)]
pub enum GridFormatError {
    #[error("Failed to read grid: {0}")]
    Io(#[from] std::io::Error),

    #[error("Grid format error at line {line}: {message}")]
    Format { line: usize, message: String },
}

fn format_error(line: usize, message: impl Into<String>) -> GridFormatError {
    GridFormatError::Format {
        line,
        message: message.into(),
    }
}

#[derive(Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, Registration)>,
    yll: Option<(f64, Registration)>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

/// Parse an ESRI ASCII grid from a string.
pub fn parse_esri_ascii(content: &str) -> Result<Grid, GridFormatError> {
    let mut header = Header::default();
    let mut lines = content.lines().enumerate().peekable();

    while let Some(&(idx, line)) = lines.peek() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            lines.next();
            continue;
        };
        if !key.starts_with(|c: char| c.is_ascii_alphabetic()) {
            break;
        }
        let value = parts
            .next()
            .ok_or_else(|| format_error(idx + 1, format!("Missing value for '{key}'")))?;
        let number = |what: &str| -> Result<f64, GridFormatError> {
            value
                .parse::<f64>()
                .map_err(|_| format_error(idx + 1, format!("Invalid {what}: {value}")))
        };
        let count = |what: &str| -> Result<usize, GridFormatError> {
            value
                .parse::<usize>()
                .map_err(|_| format_error(idx + 1, format!("Invalid {what}: {value}")))
        };
        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(count("ncols")?),
            "nrows" => header.nrows = Some(count("nrows")?),
            "xllcorner" => header.xll = Some((number("xllcorner")?, Registration::Pixel)),
            "xllcenter" => header.xll = Some((number("xllcenter")?, Registration::Gridline)),
            "yllcorner" => header.yll = Some((number("yllcorner")?, Registration::Pixel)),
            "yllcenter" => header.yll = Some((number("yllcenter")?, Registration::Gridline)),
            "cellsize" => header.cellsize = Some(number("cellsize")?),
            "dx" => header.dx = Some(number("dx")?),
            "dy" => header.dy = Some(number("dy")?),
            "nodata_value" => header.nodata = Some(number("NODATA_value")?),
            other => return Err(format_error(idx + 1, format!("Unknown header key '{other}'"))),
        }
        lines.next();
    }

    let ncols = header.ncols.ok_or_else(|| format_error(1, "Missing 'ncols'"))?;
    let nrows = header.nrows.ok_or_else(|| format_error(1, "Missing 'nrows'"))?;
    let (x0, x_reg) = header.xll.ok_or_else(|| format_error(1, "Missing 'xllcorner' or 'xllcenter'"))?;
    let (y0, y_reg) = header.yll.ok_or_else(|| format_error(1, "Missing 'yllcorner' or 'yllcenter'"))?;
    if x_reg != y_reg {
        return Err(format_error(1, "Mixed corner/center registration"));
    }
    let dx = header
        .dx
        .or(header.cellsize)
        .ok_or_else(|| format_error(1, "Missing 'cellsize' or 'dx'"))?;
    let dy = header
        .dy
        .or(header.cellsize)
        .ok_or_else(|| format_error(1, "Missing 'cellsize' or 'dy'"))?;
    let nodata = header.nodata.unwrap_or(DEFAULT_NODATA);

    let mut values = Vec::with_capacity(ncols * nrows);
    for (idx, line) in lines {
        for token in line.split_whitespace() {
            let v: f64 = token
                .parse()
                .map_err(|_| format_error(idx + 1, format!("Invalid sample: {token}")))?;
            values.push(if v == nodata { f64::NAN } else { v });
        }
    }
    if values.len() != ncols * nrows {
        return Err(format_error(
            1,
            format!("Header says {}x{} samples but found {}", ncols, nrows, values.len()),
        ));
    }

    let data = Array2::from_shape_vec((nrows, ncols), values)
        .map_err(|e| format_error(1, e.to_string()))?;
    Ok(Grid::from_array(data, x0, y0, [dx, dy], x_reg))
}

/// Read an ESRI ASCII grid file.
pub fn read_grid(path: &Path, coordinates: CoordinateSystem) -> Result<Grid, GridFormatError> {
    let content = std::fs::read_to_string(path)?;
    let mut grid = parse_esri_ascii(&content)?;
    grid.header.coordinates = coordinates;
    Ok(grid)
}

/// Format a grid as ESRI ASCII.
pub fn format_esri_ascii(grid: &Grid) -> String {
    let h = &grid.header;
    let (x_key, y_key) = match h.registration {
        Registration::Pixel => ("xllcorner", "yllcorner"),
        Registration::Gridline => ("xllcenter", "yllcenter"),
    };
    let mut out = format!(
        "ncols        {}\nnrows        {}\n{x_key}    {}\n{y_key}    {}\n",
        grid.n_columns(),
        grid.n_rows(),
        h.wesn[0],
        h.wesn[2]
    );
    if h.inc[0] == h.inc[1] {
        out.push_str(&format!("cellsize     {}\n", h.inc[0]));
    } else {
        out.push_str(&format!("dx           {}\ndy           {}\n", h.inc[0], h.inc[1]));
    }
    out.push_str(&format!("NODATA_value {DEFAULT_NODATA}\n"));
    for row in grid.data.rows() {
        let line: Vec<String> = row
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    DEFAULT_NODATA.to_string()
                } else {
                    format!("{v:.6e}")
                }
            })
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Write a grid as an ESRI ASCII file.
pub fn write_grid(grid: &Grid, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, format_esri_ascii(grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE: &str = "ncols 3\nnrows 2\nxllcorner 100.0\nyllcorner 200.0\ncellsize 50\nNODATA_value -9999\n1 2 3\n4 -9999 6\n";

    #[test]
    fn test_parse_corner_registered() {
        let g = parse_esri_ascii(SAMPLE).unwrap();
        assert_eq!(g.data.dim(), (2, 3));
        assert_eq!(g.header.registration, Registration::Pixel);
        assert_eq!(g.header.wesn, [100.0, 250.0, 200.0, 300.0]);
        assert_eq!(g.data[[0, 2]], 3.0);
        assert!(g.data[[1, 1]].is_nan());
    }

    #[test]
    fn test_parse_center_with_dx_dy() {
        let text = "NCOLS 2\nNROWS 2\nXLLCENTER 0\nYLLCENTER 0\nDX 10\nDY 20\n1 2\n3 4\n";
        let g = parse_esri_ascii(text).unwrap();
        assert_eq!(g.header.registration, Registration::Gridline);
        assert_eq!(g.header.inc, [10.0, 20.0]);
        assert_eq!(g.header.wesn, [0.0, 10.0, 0.0, 20.0]);
    }

    #[test]
    fn test_sample_count_mismatch() {
        let text = "ncols 3\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n4 5\n";
        let err = parse_esri_ascii(text).unwrap_err();
        assert!(err.to_string().contains("found 5"));
    }

    #[test]
    fn test_bad_sample_reports_line() {
        let text = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 x\n";
        match parse_esri_ascii(text) {
            Err(GridFormatError::Format { line, .. }) => assert_eq!(line, 6),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_written_grid_reads_back() {
        let g = parse_esri_ascii(SAMPLE).unwrap();
        let again = parse_esri_ascii(&format_esri_ascii(&g)).unwrap();
        assert_eq!(again.header.wesn, g.header.wesn);
        assert_abs_diff_eq!(again.data[[1, 2]], 6.0, epsilon = 1e-9);
        assert!(again.data[[1, 1]].is_nan());
    }

    #[test]
    fn test_format_header_lines() {
        let mut g = parse_esri_ascii(SAMPLE).unwrap();
        let text = format_esri_ascii(&g);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6 + 2);
        assert!(lines[2].starts_with("xllcorner"));
        assert!(lines[4].starts_with("cellsize"));

        g.header.inc = [50.0, 25.0];
        let text = format_esri_ascii(&g);
        assert!(text.contains("dx           50\n"));
        assert!(text.contains("dy           25\n"));
    }
}
