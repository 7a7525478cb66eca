use std::{
	fs,
	io::Cursor,
	path::{Path, PathBuf},
};

use base64::Engine as _;
use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

/// Longest side an image is allowed to keep once staged.
pub const MAX_IMAGE_DIMENSION: u32 = 512;

pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/heic", "image/heif"];
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
	"application/pdf",
	"application/x-javascript",
	"text/javascript",
	"application/x-python",
	"text/x-python",
	"text/plain",
	"text/css",
	"text/md",
	"text/markdown",
	"text/csv",
	"text/xml",
	"text/rtf",
];
pub const AUDIO_MIME_TYPES: &[&str] = &["audio/wav", "audio/mp3", "audio/aiff", "audio/aac", "audio/ogg", "audio/flac"];

// extension table {{{
/// Lowercase extension -> MIME type. Includes a few types we know by name but refuse, so the refusal can name them.
const EXTENSIONS: &[(&str, &str)] = &[
	("jpg", "image/jpeg"),
	("jpeg", "image/jpeg"),
	("jpe", "image/jpeg"),
	("png", "image/png"),
	("webp", "image/webp"),
	("heic", "image/heic"),
	("heif", "image/heif"),
	("gif", "image/gif"),
	("bmp", "image/bmp"),
	("svg", "image/svg+xml"),
	("pdf", "application/pdf"),
	("js", "text/javascript"),
	("mjs", "text/javascript"),
	("py", "text/x-python"),
	("txt", "text/plain"),
	("text", "text/plain"),
	("css", "text/css"),
	("md", "text/md"),
	("markdown", "text/md"),
	("csv", "text/csv"),
	("xml", "text/xml"),
	("rtf", "text/rtf"),
	("html", "text/html"),
	("htm", "text/html"),
	("json", "application/json"),
	("wav", "audio/wav"),
	("mp3", "audio/mp3"),
	("aif", "audio/aiff"),
	("aiff", "audio/aiff"),
	("aac", "audio/aac"),
	("ogg", "audio/ogg"),
	("flac", "audio/flac"),
	("mp4", "video/mp4"),
	("zip", "application/zip"),
	("exe", "application/x-msdownload"),
	("dll", "application/x-msdownload"),
];
//,}}}

/// Guesses the MIME type from the extension alone. No content sniffing.
pub fn detect_mime_type(path: &Path) -> Option<&'static str> {
	let ext = path.extension()?.to_str()?.to_ascii_lowercase();
	EXTENSIONS.iter().find(|(e, _)| *e == ext).map(|(_, mime)| *mime)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Category {
	Image,
	Document,
	Audio,
	Unsupported,
}
impl Category {
	pub fn of(mime_type: Option<&str>) -> Self {
		match mime_type {
			Some(m) if IMAGE_MIME_TYPES.contains(&m) => Self::Image,
			Some(m) if DOCUMENT_MIME_TYPES.contains(&m) => Self::Document,
			Some(m) if AUDIO_MIME_TYPES.contains(&m) => Self::Audio,
			_ => Self::Unsupported,
		}
	}
}

/// A staged upload that has been classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
	pub path: PathBuf,
	pub mime_type: Option<String>,
	pub category: Category,
}
impl Artifact {
	/// How to name the type to a user. Python's mimetypes prints `None` here; we say `unknown`.
	pub fn mime_label(&self) -> &str {
		self.mime_type.as_deref().unwrap_or("unknown")
	}

	/// Errors with [Error::UnsupportedType] unless the category is one the model accepts.
	pub fn ensure_supported(&self) -> Result<()> {
		match self.category {
			Category::Unsupported => Err(Error::UnsupportedType {
				mime_type: self.mime_label().to_owned(),
			}),
			_ => Ok(()),
		}
	}
}

pub fn classify(path: &Path) -> Artifact {
	let mime_type = detect_mime_type(path);
	Artifact {
		path: path.to_path_buf(),
		mime_type: mime_type.map(str::to_owned),
		category: Category::of(mime_type),
	}
}

/// Normalized payload attached to a request.
#[derive(Clone, Debug)]
pub enum ContentUnit {
	Text(String),
	Image(ImageUnit),
	Blob { mime_type: String, data: Vec<u8> },
}
impl ContentUnit {
	pub fn text(s: impl Into<String>) -> Self {
		Self::Text(s.into())
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(s) => Some(s),
			_ => None,
		}
	}

	/// `(mime_type, base64)` for anything that isn't a text span.
	pub fn inline_data(&self) -> Result<Option<(String, String)>> {
		let engine = base64::engine::general_purpose::STANDARD;
		Ok(match self {
			Self::Text(_) => None,
			Self::Image(img) => Some(("image/png".to_owned(), engine.encode(img.encode_png()?))),
			Self::Blob { mime_type, data } => Some((mime_type.clone(), engine.encode(data))),
		})
	}
}

/// A decoded image, already shrunk to fit [MAX_IMAGE_DIMENSION].
#[derive(Clone, Debug)]
pub struct ImageUnit {
	pub source: PathBuf,
	pub image: DynamicImage,
}
impl ImageUnit {
	pub fn width(&self) -> u32 {
		self.image.width()
	}

	pub fn height(&self) -> u32 {
		self.image.height()
	}

	/// Encoding failures come back as [Error::Decode] too: either way the upload can't be turned into something sendable.
	pub fn encode_png(&self) -> Result<Vec<u8>> {
		let mut buf = Cursor::new(Vec::new());
		self.image.write_to(&mut buf, ImageFormat::Png).map_err(|e| Error::Decode {
			path: self.source.clone(),
			reason: format!("could not re-encode as png: {e}"),
		})?;
		Ok(buf.into_inner())
	}
}

pub fn build_content_unit(artifact: &Artifact) -> Result<ContentUnit> {
	artifact.ensure_supported()?;
	let mime_type = artifact.mime_label().to_owned();

	if artifact.category == Category::Image && decodable(&mime_type) {
		return read_image(&artifact.path).map(ContentUnit::Image);
	}

	let data = fs::read(&artifact.path).map_err(|e| Error::io(&artifact.path, e))?;
	tracing::debug!(path = %artifact.path.display(), %mime_type, len = data.len(), "read file as blob");
	Ok(ContentUnit::Blob { mime_type, data })
}

/// heic and friends have no decoder here; those go out as raw typed bytes.
fn decodable(mime_type: &str) -> bool {
	ImageFormat::from_mime_type(mime_type).is_some_and(|f| f.reading_enabled())
}

/// The decoder is picked from the leading bytes, falling back to the extension, so a misnamed upload still decodes.
fn read_image(path: &Path) -> Result<ImageUnit> {
	let reader = image::ImageReader::open(path).and_then(|r| r.with_guessed_format()).map_err(|e| Error::io(path, e))?;
	let image = reader.decode().map_err(|e| match e {
		image::ImageError::IoError(source) => Error::io(path, source),
		e => Error::Decode {
			path: path.to_path_buf(),
			reason: e.to_string(),
		},
	})?;

	// never upscale
	let image = match image.width() > MAX_IMAGE_DIMENSION || image.height() > MAX_IMAGE_DIMENSION {
		true => image.thumbnail(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION),
		false => image,
	};
	Ok(ImageUnit { source: path.to_path_buf(), image })
}
