/// Environment variable naming the directory that holds the pdfium dynamic library.
///
/// When neither the configuration nor this variable is set, the system library
/// search path is used instead.
pub const PDFIUM_LIB_PATH_ENV_NAME: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Number of pages extracted per batch.
///
/// Batches run one after another; pages inside a batch are reconstructed in
/// parallel. Six pages keeps peak memory low on large exam books while still
/// keeping a few cores busy. Cancellation and progress are observed once per batch.
pub const PAGE_BATCH_SIZE: usize = 6;

/// Fraction of the page height treated as header (top) and footer (bottom).
///
/// Fragments whose vertical position falls inside either band are discarded,
/// which removes running titles and page numbers from most exam papers.
pub const HEADER_FOOTER_MARGIN: f32 = 0.05;

/// A vertical jump larger than this multiple of the fragment height starts a new line.
pub const LINE_BREAK_RATIO: f32 = 0.6;

/// A horizontal gap larger than this multiple of the fragment height inserts a space.
pub const SPACE_GAP_RATIO: f32 = 0.2;

/// Height assumed for fragments that report a zero-height box.
pub const DEFAULT_FRAGMENT_HEIGHT: f32 = 10.0;

/// Capacity of the queue feeding the pdfium worker.
pub const MAX_PENDING_EXTRACTIONS: usize = 16;

/// Upscale tiers for OCR input, keyed on the shorter image side.
///
/// Each entry is `(exclusive upper bound in pixels, scale factor)`. Images whose
/// shorter side is at least the last bound keep their resolution.
/// Small text is where OCR loses the most accuracy, so the smallest inputs get
/// the largest boost.
pub const UPSCALE_TIERS: [(u32, f32); 3] = [(500, 2.5), (1000, 1.8), (1500, 1.2)];

/// Rec. 709 luminosity weights for red, green and blue.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Default contrast boost, on the `-255..=255` scale of the classic
/// `259 * (c + 255) / (255 * (259 - c))` contrast factor.
pub const DEFAULT_CONTRAST: f32 = 40.0;

/// JPEG quality used when encoding the preprocessed image.
pub const JPEG_QUALITY: u8 = 90;

/// Tesseract language packs used by the command line OCR adapter.
pub const DEFAULT_OCR_LANGUAGES: &str = "chi_sim+eng";

/// Minimum number of options a question must carry to be emitted.
pub const MIN_OPTIONS: usize = 2;

/// Maximum number of options kept per question (`A` through `E`).
pub const MAX_OPTIONS: usize = 5;

/// Ease factor assigned to a question on its first review.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Lower bound for the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Lowest grade that counts as a successful recall.
pub const PASSING_GRADE: u8 = 3;

/// Highest grade accepted by the scheduler.
pub const MAX_GRADE: u8 = 5;
