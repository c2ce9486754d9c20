fn main() {
    rag_desk_lib::run()
}
