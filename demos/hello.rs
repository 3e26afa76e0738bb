// Submit with the handler prelude prepended:
//
//     addhandler-cli submit demos/hello.rs --with-prelude
//
// The server answers with a redirect to the route serving this handler.

fn hello(w: &mut ResponseWriter, r: &Request) {
    w.set_header("content-type", "text/plain; charset=utf-8");
    let name = r
        .query()
        .split('&')
        .find_map(|pair| pair.strip_prefix("name="))
        .unwrap_or("world");
    w.write(format!("hello, {name} ({} {})\n", r.method(), r.path()).as_bytes());
}

export_handler!(hello);
