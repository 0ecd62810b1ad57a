/// CULane lane label parser
///
/// Each line of a `.lines.txt` file describes one lane as space-separated
/// floats `x0 y0 x1 y1 ...`, which are grouped into (x, y) points.
use std::path::PathBuf;

use crate::errors::{VisError, VisResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One lane: ordered points from the first annotated row onwards
pub type Lane = Vec<Point>;

/// Where label text comes from
#[derive(Debug, Clone)]
pub enum LabelSource {
    Path(PathBuf),
    Lines(Vec<String>),
}

impl From<PathBuf> for LabelSource {
    fn from(path: PathBuf) -> Self {
        LabelSource::Path(path)
    }
}

impl From<Vec<String>> for LabelSource {
    fn from(lines: Vec<String>) -> Self {
        LabelSource::Lines(lines)
    }
}

/// Parse a CULane label into one lane per line.
///
/// Fails on the first line whose token count is odd or which holds a token
/// that is not a float. A blank line is a single empty token and fails too.
pub fn parse_lane_label(source: LabelSource) -> VisResult<Vec<Lane>> {
    let lines = match source {
        LabelSource::Path(path) => {
            let content = std::fs::read_to_string(&path).map_err(|e| VisError::io(&path, e))?;
            content.lines().map(str::to_string).collect::<Vec<_>>()
        }
        LabelSource::Lines(lines) => lines,
    };

    lines
        .iter()
        .enumerate()
        .map(|(index, line)| parse_lane_line(index + 1, line))
        .collect()
}

fn parse_lane_line(line_no: usize, line: &str) -> VisResult<Lane> {
    let values = line
        .trim()
        .split(' ')
        .map(|token| {
            token.parse::<f32>().map_err(|_| VisError::ParseFloat {
                line: line_no,
                token: token.to_string(),
            })
        })
        .collect::<VisResult<Vec<f32>>>()?;

    if values.len() % 2 != 0 {
        return Err(VisError::OddCoordinateCount {
            line: line_no,
            tokens: values.len(),
        });
    }

    Ok(values
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0], pair[1]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lines(raw: &[&str]) -> LabelSource {
        LabelSource::Lines(raw.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_lines() {
        let lanes = parse_lane_label(lines(&[
            "10.5 590 20 580 30.25 570 ",
            "700 590 690 580",
        ]))
        .unwrap();

        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].len(), 3);
        assert_eq!(lanes[1].len(), 2);
        assert_eq!(lanes[0][0], Point::new(10.5, 590.0));
        assert_eq!(lanes[0][2], Point::new(30.25, 570.0));
        assert_eq!(lanes[1][1], Point::new(690.0, 580.0));
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1 2 3 4").unwrap();
        writeln!(file, "5 6").unwrap();

        let lanes = parse_lane_label(LabelSource::Path(file.path().to_path_buf())).unwrap();
        assert_eq!(lanes, vec![
            vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
            vec![Point::new(5.0, 6.0)],
        ]);
    }

    #[test]
    fn test_empty_label_has_no_lanes() {
        assert!(parse_lane_label(lines(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_odd_token_count_is_fatal() {
        let err = parse_lane_label(lines(&["1 2 3 4", "1 2 3"])).unwrap_err();
        match err {
            VisError::OddCoordinateCount { line, tokens } => {
                assert_eq!(line, 2);
                assert_eq!(tokens, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_token() {
        let err = parse_lane_label(lines(&["1 2 x 4"])).unwrap_err();
        assert!(matches!(err, VisError::ParseFloat { line: 1, .. }));

        // A blank line is one empty token
        let err = parse_lane_label(lines(&[""])).unwrap_err();
        assert!(matches!(err, VisError::ParseFloat { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_lane_label(LabelSource::Path(PathBuf::from("/nonexistent/a.lines.txt")))
            .unwrap_err();
        assert!(matches!(err, VisError::Io { .. }));
    }
}
