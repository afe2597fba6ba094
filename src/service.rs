/// Bridge between the HTTP layer and the imgFS store
///
/// Routes:
/// - `/` and `/index.html` serve the landing page
/// - `/imgfs/list` returns the JSON listing
/// - `/imgfs/read?res=..&img_id=..` returns image bytes
/// - `POST /imgfs/insert?name=..` stores the request body
/// - `/imgfs/delete?img_id=..` removes an image
///
/// The store lock is held only for the store call itself; replies are sent
/// after it is released.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{ImgfsError, Result};
use crate::http::reply::{HTTP_FOUND, HTTP_INTERNAL_ERROR, HTTP_NOT_FOUND, HTTP_OK};
use crate::http::{HttpMessage, MessageHandler, Responder};
use crate::store::data::MAX_IMG_ID;
use crate::store::{do_list, ImgFs, ListMode, Resolution};

pub const URI_ROOT: &str = "/imgfs";
pub const BASE_FILE: &str = "index.html";

/// Longest accepted value of the `res` query variable
const MAX_RES_NAME: usize = 16;

pub struct ImgfsService<F = File> {
    store: Mutex<ImgFs<F>>,
    port: u16,
    index_path: PathBuf,
}

impl<F: Read + Write + Seek + Send> ImgfsService<F> {
    pub fn new(store: ImgFs<F>, port: u16, index_path: impl Into<PathBuf>) -> Self {
        Self {
            store: Mutex::new(store),
            port,
            index_path: index_path.into(),
        }
    }

    /// Give the store back, e.g. to close it on shutdown
    pub fn into_store(self) -> Result<ImgFs<F>> {
        self.store.into_inner().map_err(|_| ImgfsError::Threading)
    }

    /// Run `op` with exclusive access to the store
    fn with_store<T>(&self, op: impl FnOnce(&mut ImgFs<F>) -> Result<T>) -> Result<T> {
        let mut store = self.store.lock().map_err(|_| ImgfsError::Threading)?;
        op(&mut store)
    }

    fn reply_error(&self, responder: &mut Responder<'_>, err: ImgfsError) -> Result<()> {
        debug!(connection = responder.connection_id(), error = %err, "Replying with error");
        let body = format!("Error: {}\n", err);
        responder.reply(HTTP_INTERNAL_ERROR, "", body.as_bytes())
    }

    fn reply_302(&self, responder: &mut Responder<'_>) -> Result<()> {
        let location = format!("Location: http://localhost:{}/{}\r\n", self.port, BASE_FILE);
        responder.reply(HTTP_FOUND, &location, &[])
    }

    fn serve_file(&self, responder: &mut Responder<'_>) -> Result<()> {
        match std::fs::read(&self.index_path) {
            Ok(page) => responder.reply(HTTP_OK, "Content-Type: text/html; charset=utf-8\r\n", &page),
            Err(err) => {
                warn!(path = %self.index_path.display(), error = %err, "Failed to open landing page");
                responder.reply(HTTP_NOT_FOUND, "", &[])
            }
        }
    }

    fn handle_list(&self, responder: &mut Responder<'_>) -> Result<()> {
        match self.with_store(|store| do_list(store, ListMode::Json)) {
            Ok(json) => responder.reply(HTTP_OK, "Content-Type: application/json\r\n", json.as_bytes()),
            Err(err) => self.reply_error(responder, err),
        }
    }

    fn handle_read(&self, message: &HttpMessage<'_>, responder: &mut Responder<'_>) -> Result<()> {
        let request = query_var(message, "res", MAX_RES_NAME)
            .and_then(|res| Resolution::parse(res))
            .and_then(|res| Ok((res, query_var(message, "img_id", MAX_IMG_ID)?)));
        let (res, img_id) = match request {
            Ok(request) => request,
            Err(err) => return self.reply_error(responder, err),
        };

        match self.with_store(|store| store.read(img_id, res)) {
            Ok(image) => responder.reply(HTTP_OK, "Content-Type: image/jpeg\r\n", &image),
            Err(err) => self.reply_error(responder, err),
        }
    }

    fn handle_insert(&self, message: &HttpMessage<'_>, responder: &mut Responder<'_>) -> Result<()> {
        let img_id = match query_var(message, "name", MAX_IMG_ID) {
            Ok(img_id) => img_id,
            Err(err) => return self.reply_error(responder, err),
        };

        match self.with_store(|store| store.insert(message.body, img_id)) {
            Ok(_) => self.reply_302(responder),
            Err(err) => self.reply_error(responder, err),
        }
    }

    fn handle_delete(&self, message: &HttpMessage<'_>, responder: &mut Responder<'_>) -> Result<()> {
        let img_id = match query_var(message, "img_id", MAX_IMG_ID) {
            Ok(img_id) => img_id,
            Err(err) => return self.reply_error(responder, err),
        };

        match self.with_store(|store| store.delete(img_id)) {
            Ok(()) => self.reply_302(responder),
            Err(err) => self.reply_error(responder, err),
        }
    }
}

impl<F: Read + Write + Seek + Send> MessageHandler for ImgfsService<F> {
    fn handle_message(&self, message: &HttpMessage<'_>, responder: &mut Responder<'_>) -> Result<()> {
        if message.uri == "/" || message.match_uri("/index.html") {
            return self.serve_file(responder);
        }

        debug!(
            connection = responder.connection_id(),
            method = message.method,
            uri = message.uri,
            "Handling request"
        );

        if message.match_uri("/imgfs/list") {
            self.handle_list(responder)
        } else if message.match_uri("/imgfs/insert") && message.match_verb("POST") {
            self.handle_insert(message, responder)
        } else if message.match_uri("/imgfs/read") {
            self.handle_read(message, responder)
        } else if message.match_uri("/imgfs/delete") {
            self.handle_delete(message, responder)
        } else {
            self.reply_error(responder, ImgfsError::InvalidCommand)
        }
    }
}

/// Required query variable bounded to `max_len` bytes
fn query_var<'a>(message: &HttpMessage<'a>, name: &str, max_len: usize) -> Result<&'a str> {
    let value = message.query_var(name).ok_or(ImgfsError::NotEnoughArguments)?;
    if value.len() > max_len {
        return Err(ImgfsError::InvalidArgument);
    }
    Ok(value)
}
