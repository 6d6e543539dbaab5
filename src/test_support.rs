//! Helpers shared by the unit tests.

use std::io::Cursor;
use std::net::SocketAddr;

use axum::Router;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Encodes a solid-colour PNG of the given size.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// Encodes a solid-colour JPEG of the given size.
pub(crate) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 160, 220]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode test image");
    buf
}

/// Serves `app` on an ephemeral localhost port and returns its address.
pub(crate) async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
