use axum::{
  extract::{Query, State},
  headers::ContentType,
  response::{Html, IntoResponse, Response},
  TypedHeader,
};

use crate::{
  api::ConvertReq,
  convert::Converter,
  media::{format_duration, MediaDescriptor, UI_FILENAME_CHARS},
  Error,
};

pub const HOMEPAGE_HTML: &str = include_str!("../html/homepage.html");

// Follows /progress for the download started by the link it is attached to.
const PROGRESS_SCRIPT: &str = r#"<script>
document.getElementById("download").addEventListener("click", function () {
  var link = this;
  var bar = document.getElementById("progress");
  var status = document.getElementById("status");
  bar.value = 0;
  bar.hidden = false;
  status.textContent = "Converting...";
  var events = new EventSource("/progress?token=" + link.dataset.token);
  events.onmessage = function (e) {
    var fraction = parseFloat(e.data);
    bar.value = fraction;
    if (fraction >= 1) {
      status.textContent = "Conversion complete!";
      events.close();
    }
  };
  events.onerror = function () {
    events.close();
    bar.hidden = true;
  };
});
</script>
"#;

pub async fn homepage() -> impl IntoResponse {
  (
    TypedHeader::<ContentType>(ContentType::html()),
    HOMEPAGE_HTML,
  )
}

// Resolves the video once to show what is about to be converted. Playback
// and download both go through the same converter as the API.
pub async fn convert_page(
  State(converter): State<Converter>,
  Query(req): Query<ConvertReq>,
) -> Response {
  let url = req.url.as_deref();
  match converter.prepare(url).await {
    Ok(media) => {
      let token = format!("{:016x}", rand::random::<u64>());
      let html = result_html(url.unwrap_or_default(), &media, &token);
      Html(html).into_response()
    }
    Err(err) => (err.status_code(), Html(error_html(&err))).into_response(),
  }
}

fn result_html(
  video_url: &str,
  media: &MediaDescriptor,
  token: &str,
) -> String {
  let query: String =
    url::form_urlencoded::byte_serialize(video_url.as_bytes()).collect();
  let duration = media
    .duration
    .map(format_duration)
    .map(|d| format!("<p class=\"caption\">Duration: {d}</p>\n"))
    .unwrap_or_default();

  page(&format!(
    "<h2>{title}</h2>\n\
     {duration}\
     <audio controls preload=\"none\" src=\"/convert?url={query}\"></audio>\n\
     <p><a id=\"download\" href=\"/download?url={query}&amp;token={token}\" \
     data-token=\"{token}\" download=\"{filename}\">Download MP3</a></p>\n\
     <p><progress id=\"progress\" max=\"1\" value=\"0\" hidden></progress> \
     <span id=\"status\"></span></p>\n\
     {PROGRESS_SCRIPT}",
    title = escape_html(&media.title),
    filename = escape_html(&media.filename(UI_FILENAME_CHARS)),
  ))
}

fn error_html(err: &Error) -> String {
  page(&format!(
    "<p class=\"error\">{}</p>\n",
    escape_html(&err.to_string())
  ))
}

fn page(body: &str) -> String {
  format!(
    "<!DOCTYPE html>\n\
     <html lang=\"en\">\n\
     <head><meta charset=\"utf-8\" /><title>YouTube to MP3 Streamer</title></head>\n\
     <body>\n\
     <p><a href=\"/\">&larr; Convert another</a></p>\n\
     {body}\
     </body>\n\
     </html>\n"
  )
}

fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}
