fn main() {
	dnsflow::main();
}
