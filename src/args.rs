use roi_analyzer::analysis::AnalysisConfig;
use roi_analyzer::geometry::Rect;
use roi_analyzer::template_matching::MatchMethod;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Analyze,
    Apply,
    CreateTemplate(String),
    ListTemplates,
    Monitor,
}

/// A rectangle given on the command line as `name:x1,y1,x2,y2`
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRect {
    pub name: Option<String>,
    pub rect: Rect,
}

impl NamedRect {
    pub fn parse(text: &str) -> Option<Self> {
        match text.rsplit_once(':') {
            Some((name, coords)) => {
                let name = name.trim();
                Some(Self {
                    name: (!name.is_empty()).then(|| name.to_string()),
                    rect: Rect::parse(coords)?,
                })
            }
            None => Some(Self {
                name: None,
                rect: Rect::parse(text)?,
            }),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub mode: Mode,
    pub image: Option<PathBuf>,
    pub rois: Vec<NamedRect>,
    pub matched_rois: Vec<NamedRect>,
    pub references: Vec<NamedRect>,
    pub template: Option<String>,
    pub templates_dir: PathBuf,
    pub targets: Option<PathBuf>,
    pub lang: String,
    pub numbers_only: bool,
    pub threshold: f32,
    pub method: MatchMethod,
    pub canvas: Option<(u32, u32)>,
    pub debug_dir: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub interval_ms: u64,
    pub timeout_secs: Option<u64>,
    pub debug_mode: bool,
}

impl Args {
    pub fn parse() -> Option<Self> {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::parse_from(&args)
    }

    pub fn parse_from(args: &[String]) -> Option<Self> {
        let mut mode: Option<Mode> = None;
        let mut parsed = Args {
            mode: Mode::Analyze,
            image: None,
            rois: Vec::new(),
            matched_rois: Vec::new(),
            references: Vec::new(),
            template: None,
            templates_dir: PathBuf::from("templates"),
            targets: None,
            lang: "eng".to_string(),
            numbers_only: false,
            threshold: 0.7,
            method: MatchMethod::default(),
            canvas: None,
            debug_dir: None,
            out: None,
            interval_ms: 1000,
            timeout_secs: None,
            debug_mode: false,
        };

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "ROI Analyzer v{} ({})",
                    env!("APP_VERSION_DISPLAY"),
                    env!("ROI_BUILD_YEAR")
                );
                return None;
            } else if arg == "--debug" {
                parsed.debug_mode = true;
            } else if arg == "--analyze" {
                mode = Some(Mode::Analyze);
            } else if arg == "--apply" {
                mode = Some(Mode::Apply);
            } else if arg == "--list-templates" {
                mode = Some(Mode::ListTemplates);
            } else if arg == "--monitor" {
                mode = Some(Mode::Monitor);
            } else if arg == "--numbers-only" {
                parsed.numbers_only = true;
            } else if let Some(name) = arg.strip_prefix("--create-template=") {
                if name.trim().is_empty() {
                    eprintln!("❌ Template name cannot be empty");
                    return None;
                }
                mode = Some(Mode::CreateTemplate(name.trim().to_string()));
            } else if let Some(val) = arg.strip_prefix("--image=") {
                parsed.image = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--roi=") {
                parsed.rois.push(parse_rect(val)?);
            } else if let Some(val) = arg.strip_prefix("--matched-roi=") {
                parsed.matched_rois.push(parse_rect(val)?);
            } else if let Some(val) = arg.strip_prefix("--reference=") {
                parsed.references.push(parse_rect(val)?);
            } else if let Some(val) = arg.strip_prefix("--template=") {
                parsed.template = Some(val.to_string());
            } else if let Some(val) = arg.strip_prefix("--templates-dir=") {
                parsed.templates_dir = PathBuf::from(val);
            } else if let Some(val) = arg.strip_prefix("--targets=") {
                parsed.targets = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--lang=") {
                parsed.lang = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--threshold=") {
                match val.parse::<f32>() {
                    Ok(t) if (0.0..=1.0).contains(&t) => parsed.threshold = t,
                    _ => {
                        eprintln!("❌ Invalid threshold value: {val} (expected 0.0 to 1.0)");
                        return None;
                    }
                }
            } else if let Some(val) = arg.strip_prefix("--method=") {
                parsed.method = parse_method(val)?;
            } else if let Some(val) = arg.strip_prefix("--canvas=") {
                parsed.canvas = Some(parse_size(val)?);
            } else if let Some(val) = arg.strip_prefix("--debug-dir=") {
                parsed.debug_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--out=") {
                parsed.out = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--interval=") {
                match val.parse::<u64>() {
                    Ok(ms) if ms > 0 => parsed.interval_ms = ms,
                    _ => {
                        eprintln!("❌ Invalid interval value: {val}");
                        return None;
                    }
                }
            } else if let Some(val) = arg.strip_prefix("--timeout=") {
                match val.parse::<u64>() {
                    Ok(secs) => parsed.timeout_secs = Some(secs),
                    Err(_) => {
                        eprintln!("❌ Invalid timeout value: {val}");
                        return None;
                    }
                }
            } else {
                eprintln!("❌ Unknown argument: {arg}");
                print_help();
                return None;
            }
        }

        parsed.mode = mode.unwrap_or(Mode::Analyze);
        Some(parsed)
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            ocr_language: self.lang.clone(),
            numbers_only: self.numbers_only,
            match_method: self.method,
            match_threshold: self.threshold,
            debug_dir: self.debug_dir.clone(),
            min_live_roi_size: (self.mode == Mode::Monitor).then_some(5),
        }
    }
}

fn parse_rect(val: &str) -> Option<NamedRect> {
    let parsed = NamedRect::parse(val);
    if parsed.is_none() {
        eprintln!("❌ Invalid rectangle: {val} (expected name:x1,y1,x2,y2)");
    }
    parsed
}

fn parse_method(val: &str) -> Option<MatchMethod> {
    let by_code = val.parse::<i32>().ok().and_then(MatchMethod::from_code);
    let by_label = || {
        MatchMethod::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(val))
    };
    let method = by_code.or_else(by_label);
    if method.is_none() {
        eprintln!("❌ Unknown match method: {val} (use 0-5 or e.g. TM_CCOEFF_NORMED)");
    }
    method
}

fn parse_size(val: &str) -> Option<(u32, u32)> {
    if let Some((w, h)) = val.split_once(['x', 'X'])
        && let (Ok(w), Ok(h)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>())
    {
        return Some((w, h));
    }
    eprintln!("❌ Invalid canvas size: {val} (expected WIDTHxHEIGHT)");
    None
}

fn print_help() {
    println!("🔍 ROI Analyzer - OCR and target detection in screen regions");
    println!();
    println!("USAGE:");
    println!("    roi-analyzer [MODE] [OPTIONS]");
    println!();
    println!("MODES:");
    println!("    --analyze                 Analyze ROIs of an image (default)");
    println!("    --apply                   Apply a stored template to an image, then analyze");
    println!("    --create-template=NAME    Store the given ROIs and reference regions as a template");
    println!("    --list-templates          List stored templates");
    println!("    --monitor                 Re-analyze an image file on an interval");
    println!();
    println!("INPUTS:");
    println!("    --image=PATH              Image to analyze");
    println!("    --roi=NAME:X1,Y1,X2,Y2    Fixed ROI (repeatable)");
    println!("    --matched-roi=NAME:...    Template-matched ROI for --create-template (repeatable)");
    println!("    --reference=NAME:...      Reference region for --create-template (repeatable)");
    println!("    --template=NAME           Template to apply");
    println!("    --templates-dir=DIR       Template directory (default: templates)");
    println!("    --targets=PATH            Target set JSON file");
    println!();
    println!("SETTINGS:");
    println!("    --lang=CODE               Tesseract language (default: eng)");
    println!("    --numbers-only            Read every ROI as a single numeric line");
    println!("    --threshold=T             Match threshold 0.0 to 1.0 (default: 0.7)");
    println!("    --method=M                Match method 0-5 or name (default: 5, TM_CCOEFF_NORMED)");
    println!("    --canvas=WxH              Display size used for template window scaling");
    println!("    --debug-dir=DIR           Save original and preprocessed ROI crops");
    println!("    --out=PATH                Results JSON file (directory in --monitor mode)");
    println!("    --interval=MS             Monitor capture interval (default: 1000)");
    println!("    --timeout=N               Stop monitoring after N seconds");
    println!("    --debug                   Enable debug logging");
    println!("    --help, -h                Show this help message");
    println!("    --version, -v             Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    roi-analyzer --image=shot.png --roi=Gold:10,10,120,40 --out=results.json");
    println!("    roi-analyzer --image=shot.png --create-template=hud --matched-roi=Gold:10,10,120,40 --reference=Logo:0,0,60,60");
    println!("    roi-analyzer --apply --template=hud --image=new.png --targets=targets.json");
    println!("    roi-analyzer --monitor --image=live.png --roi=Score:0,0,200,50 --interval=500 --timeout=30");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Args> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Args::parse_from(&owned)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--image=a.png"]).unwrap();
        assert_eq!(args.mode, Mode::Analyze);
        assert_eq!(args.templates_dir, PathBuf::from("templates"));
        assert_eq!(args.method, MatchMethod::CCoeffNormed);
        assert!(args.analysis_config().min_live_roi_size.is_none());
    }

    #[test]
    fn test_rois_and_template_flags() {
        let args = parse(&[
            "--create-template=hud",
            "--roi=Gold:10,10,120,40",
            "--matched-roi=5,5,50,50",
            "--reference=Logo:[0,0,60,60]",
            "--method=TM_SQDIFF_NORMED",
            "--canvas=1280x720",
        ])
        .unwrap();

        assert_eq!(args.mode, Mode::CreateTemplate("hud".to_string()));
        assert_eq!(args.rois[0].name.as_deref(), Some("Gold"));
        assert_eq!(args.rois[0].rect, Rect::new(10, 10, 120, 40));
        assert!(args.matched_rois[0].name.is_none());
        assert_eq!(args.references[0].rect, Rect::new(0, 0, 60, 60));
        assert_eq!(args.method, MatchMethod::SqDiffNormed);
        assert_eq!(args.canvas, Some((1280, 720)));
    }

    #[test]
    fn test_monitor_mode_enables_live_skip() {
        let args = parse(&["--monitor", "--interval=250", "--method=3"]).unwrap();
        assert_eq!(args.interval_ms, 250);
        assert_eq!(args.method, MatchMethod::CCorrNormed);
        assert_eq!(args.analysis_config().min_live_roi_size, Some(5));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(parse(&["--threshold=1.5"]).is_none());
        assert!(parse(&["--method=9"]).is_none());
        assert!(parse(&["--roi=Gold:1,2,3"]).is_none());
        assert!(parse(&["--canvas=12by7"]).is_none());
        assert!(parse(&["--bogus"]).is_none());
    }
}
