use crate::resolution::Resolution;
use regex::Regex;

#[derive(Debug, PartialEq, Eq)]
pub(super) struct XrandrOutput {
    pub(super) name: String,
    pub(super) connected: bool,
    pub(super) enabled: bool,
    pub(super) primary: bool,
    /// Physical size in millimetres, when the monitor reports one.
    pub(super) size_mm: Option<(u32, u32)>,
    /// Progressive modes in the order xrandr lists them. May repeat.
    pub(super) resolutions: Vec<Resolution>,
}

struct Parser {
    output_line_regex: Regex,
    size_regex: Regex,
    mode_line_regex: Regex,
}

impl Parser {
    fn new() -> Self {
        Self {
            output_line_regex: Regex::new(
                r"(?x)
                ^(?P<name>\S+)
                \s(?P<status>connected|disconnected|unknown\sconnection)
                (?P<primary>\sprimary)?
                (?:\s(?P<geometry>\d+x\d+\+\d+\+\d+))?
                (?:\s|$)
            ",
            )
            .expect("bad output_line_regex"),
            size_regex: Regex::new(r"\s(?P<width>\d+)mm\sx\s(?P<height>\d+)mm\s*$")
                .expect("bad size_regex"),
            mode_line_regex: Regex::new(r"^\s+(?P<width>\d+)x(?P<height>\d+)\s+\d+\.\d{2}")
                .expect("bad mode_line_regex"),
        }
    }

    fn parse_output_line(&self, line: &str) -> Option<XrandrOutput> {
        let caps = self.output_line_regex.captures(line)?;

        let size_mm = self
            .size_regex
            .captures(line)
            .and_then(|size| {
                Some((
                    size["width"].parse::<u32>().ok()?,
                    size["height"].parse::<u32>().ok()?,
                ))
            })
            .filter(|&(width, height): &(u32, u32)| width != 0 && height != 0);

        Some(XrandrOutput {
            name: caps["name"].to_string(),
            connected: &caps["status"] == "connected",
            enabled: caps.name("geometry").is_some(),
            primary: caps.name("primary").is_some(),
            size_mm,
            resolutions: Vec::new(),
        })
    }

    fn parse_mode_line(&self, line: &str) -> Option<Resolution> {
        let caps = self.mode_line_regex.captures(line)?;
        Some(Resolution::new(
            caps["width"].parse().ok()?,
            caps["height"].parse().ok()?,
        ))
    }

    fn parse(&self, xrandr_output: &str) -> Vec<XrandrOutput> {
        let mut outputs: Vec<XrandrOutput> = Vec::new();
        // Mode lines only belong to the output header right above them.
        let mut in_output = false;

        for line in xrandr_output.lines() {
            if let Some(output) = self.parse_output_line(line) {
                outputs.push(output);
                in_output = true;
            } else if !line.starts_with(char::is_whitespace) {
                in_output = false;
            } else if let Some(output) = outputs.last_mut().filter(|_| in_output) {
                output.resolutions.extend(self.parse_mode_line(line));
            }
        }

        outputs
    }
}

pub(super) fn parse(xrandr_output: &str) -> Vec<XrandrOutput> {
    Parser::new().parse(xrandr_output)
}
