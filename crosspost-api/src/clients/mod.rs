//! HTTP implementations of the remote collaborators.

pub mod dispatch;
pub mod draft;

#[cfg(test)]
pub(crate) async fn serve_for_test(router: axum::Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    address
}
